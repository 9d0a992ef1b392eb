use configuration::{EtlSettings, SourceSettings};
use core_types::{RawRecord, RawValue, SourceKind};
use futures::future::join_all;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::IngestionError;

/// Reads one CSV extract into raw records. Headers become column names; empty cells
/// become [`RawValue::Null`] and everything else stays text until consolidation.
///
/// Cells that are not valid UTF-8 (Latin-1 exports, typically) are decoded lossily so a
/// single bad byte never costs the rest of the extract.
pub fn read_csv_extract(path: &Path) -> Result<Vec<RawRecord>, IngestionError> {
    let file = std::fs::File::open(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|column| String::from_utf8_lossy(column).into_owned())
        .collect();
    let mut records = Vec::new();
    for (position, row) in reader.byte_records().enumerate() {
        let row = row?;
        let mut record = RawRecord::new();
        for (column, cell) in headers.iter().zip(row.iter()) {
            let text = String::from_utf8_lossy(cell);
            if let Cow::Owned(_) = text {
                tracing::warn!(path = %path.display(), position, %column, "cell is not valid UTF-8, decoded lossily");
            }
            let value = if text.is_empty() {
                RawValue::Null
            } else {
                RawValue::text(text)
            };
            record.insert(column.clone(), value);
        }
        records.push(record);
    }

    tracing::debug!(path = %path.display(), rows = records.len(), "extract read");
    Ok(records)
}

/// The extract of one source, or why it could not be read.
pub type ExtractResult = (SourceKind, Result<Vec<RawRecord>, IngestionError>);

/// Reads every configured source extract concurrently.
///
/// Each read runs on the blocking pool under `etl.extraction_timeout_secs`. A failing
/// source does not stop the others; results come back in configuration order.
pub async fn extract_all(sources: &[SourceSettings], etl: &EtlSettings) -> Vec<ExtractResult> {
    let timeout = Duration::from_secs(etl.extraction_timeout_secs);
    let tasks = sources.iter().map(|source| {
        let kind = source.kind;
        let path = source.extract_path(etl);
        async move { (kind, extract_one(kind, path, timeout).await) }
    });
    join_all(tasks).await
}

async fn extract_one(
    kind: SourceKind,
    path: PathBuf,
    timeout: Duration,
) -> Result<Vec<RawRecord>, IngestionError> {
    tracing::info!(source = %kind, path = %path.display(), "extracting source");
    let handle = tokio::task::spawn_blocking(move || read_csv_extract(&path));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(IngestionError::TaskFailed {
            kind,
            detail: join_error.to_string(),
        }),
        Err(_) => Err(IngestionError::ExtractionTimeout {
            kind,
            secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_extract(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn empty_cells_read_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_extract(
            dir.path(),
            "solicitudes.csv",
            "id_solicitud,fecha_creacion,fecha_resolucion\n1, 2024-01-01 08:00:00 ,\n",
        );

        let records = read_csv_extract(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id_solicitud"), Some(&RawValue::text("1")));
        assert_eq!(
            records[0].get("fecha_creacion"),
            Some(&RawValue::text("2024-01-01 08:00:00"))
        );
        assert_eq!(records[0].get("fecha_resolucion"), Some(&RawValue::Null));
    }

    #[test]
    fn latin1_cells_do_not_cost_the_other_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solicitudes.csv");
        let mut body = b"id_solicitud,tipo_solicitud\n1,Agua\n2,Alumbrado P".to_vec();
        body.push(0xFA);
        body.extend_from_slice(b"blico\n3,Baches\n");
        std::fs::write(&path, body).unwrap();

        let records = read_csv_extract(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("tipo_solicitud"), Some(&RawValue::text("Agua")));
        assert_eq!(
            records[1].get("tipo_solicitud"),
            Some(&RawValue::text("Alumbrado P\u{FFFD}blico"))
        );
        assert_eq!(records[1].get("id_solicitud"), Some(&RawValue::text("2")));
        assert_eq!(records[2].get("tipo_solicitud"), Some(&RawValue::text("Baches")));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_csv_extract(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, IngestionError::Io { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn one_failing_source_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        write_extract(
            dir.path(),
            "solicitudes.csv",
            "id_solicitud,fecha_creacion\n1,2024-01-01\n2,2024-01-02\n",
        );
        let etl = EtlSettings {
            raw_data_dir: dir.path().to_path_buf(),
            ..EtlSettings::default()
        };
        let sources = [
            SourceSettings::new(SourceKind::Solicitudes),
            SourceSettings::new(SourceKind::Seguimiento),
        ];

        let results = extract_all(&sources, &etl).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, SourceKind::Solicitudes);
        assert_eq!(results[0].1.as_ref().unwrap().len(), 2);
        assert_eq!(results[1].0, SourceKind::Seguimiento);
        assert!(results[1].1.is_err());
    }
}
