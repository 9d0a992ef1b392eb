use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::ensemble::TrainedEnsemble;
use crate::error::ForecastError;

const PREFIX: &str = "ensemble_";
const EXTENSION: &str = "bin";
const LATEST_KEY: &str = "latest";
const KEY_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Trained ensembles on disk, keyed by training timestamp, with a `latest` alias.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{PREFIX}{key}.{EXTENSION}"))
    }

    /// Writes the ensemble under its training timestamp and refreshes `latest`.
    /// Returns the timestamped path.
    pub fn save(&self, ensemble: &TrainedEnsemble) -> Result<PathBuf, ForecastError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ForecastError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let key = ensemble.metadata().trained_at.format(KEY_FORMAT).to_string();
        let path = self.path_for(&key);
        write_artifact(ensemble, &path)?;
        write_artifact(ensemble, &self.path_for(LATEST_KEY))?;

        tracing::info!(
            model_id = %ensemble.metadata().id,
            path = %path.display(),
            "model artifact saved"
        );
        Ok(path)
    }

    /// Loads by timestamp key (`YYYYmmdd_HHMMSS_mmm`) or `latest`.
    pub fn load(&self, key: &str) -> Result<TrainedEnsemble, ForecastError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(ForecastError::ModelNotFound(path));
        }
        let file = File::open(&path).map_err(|source| ForecastError::Io {
            path: path.clone(),
            source,
        })?;
        let ensemble: TrainedEnsemble = bincode::deserialize_from(BufReader::new(file))?;
        tracing::debug!(model_id = %ensemble.metadata().id, path = %path.display(), "model artifact loaded");
        Ok(ensemble)
    }

    pub fn load_latest(&self) -> Result<TrainedEnsemble, ForecastError> {
        self.load(LATEST_KEY)
    }

    /// Timestamp keys of every stored artifact, oldest first. `latest` is not listed.
    pub fn keys(&self) -> Result<Vec<String>, ForecastError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ForecastError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let suffix = format!(".{EXTENSION}");
        let mut keys: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| {
                name.strip_prefix(PREFIX)
                    .and_then(|rest| rest.strip_suffix(&suffix))
                    .map(str::to_string)
            })
            .filter(|key| key != LATEST_KEY)
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn write_artifact(ensemble: &TrainedEnsemble, path: &Path) -> Result<(), ForecastError> {
    let file = File::create(path).map_err(|source| ForecastError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, ensemble)?;
    writer.flush().map_err(|source| ForecastError::Io {
        path: path.to_path_buf(),
        source,
    })
}
