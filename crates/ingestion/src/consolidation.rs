use chrono::{DateTime, Utc};
use configuration::CategorySettings;
use core_types::{CanonicalDataset, CanonicalRecord, IntermediateRecord, RequestStatus, SourceKind};
use std::collections::HashMap;

use crate::adapter::{AdaptedStream, RejectedRecord};
use crate::error::RecordError;

/// Two attention times closer than this are considered the same value.
const HOURS_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationOptions {
    /// Stable-sort the accepted records by `requested_at`. Off by default: the output
    /// otherwise follows the order of the input streams.
    pub sort_by_requested_at: bool,
}

/// The result of one consolidation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidationOutcome {
    pub dataset: CanonicalDataset,
    pub rejected: Vec<RejectedRecord>,
}

impl ConsolidationOutcome {
    pub fn total_input(&self) -> usize {
        self.dataset.len() + self.rejected.len()
    }

    /// Share of input records that were quarantined, in [0, 1].
    pub fn rejection_rate(&self) -> f64 {
        match self.total_input() {
            0 => 0.0,
            total => self.rejected.len() as f64 / total as f64,
        }
    }
}

/// Merges adapted streams from every source into one canonical dataset.
///
/// The engine is stateless between runs: the same streams always produce the same
/// dataset and the same rejection list.
#[derive(Debug, Clone)]
pub struct ConsolidationEngine {
    /// Lower-cased alias to canonical label.
    aliases: HashMap<String, String>,
    default_category: String,
    options: ConsolidationOptions,
}

/// A record that passed normalization, remembered with where it came from.
struct Candidate {
    stream: usize,
    position: usize,
    record: CanonicalRecord,
}

impl ConsolidationEngine {
    pub fn new(categories: &CategorySettings, options: ConsolidationOptions) -> Self {
        let aliases = categories
            .aliases
            .iter()
            .map(|(alias, label)| (clean_label(alias).to_lowercase(), clean_label(label)))
            .collect();
        Self {
            aliases,
            default_category: categories.default_category.clone(),
            options,
        }
    }

    /// Consolidates the streams in the order given.
    pub fn consolidate(&self, streams: &[AdaptedStream]) -> ConsolidationOutcome {
        // Rejections are keyed by (stream, position) so the final list has a stable order.
        let mut rejected: Vec<(usize, RejectedRecord)> = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for (stream_idx, stream) in streams.iter().enumerate() {
            rejected.extend(stream.rejected.iter().cloned().map(|r| (stream_idx, r)));

            for intermediate in &stream.records {
                match self.canonicalize(intermediate) {
                    Ok(record) => candidates.push(Candidate {
                        stream: stream_idx,
                        position: intermediate.position,
                        record,
                    }),
                    Err(error) => {
                        tracing::debug!(
                            source = %intermediate.source,
                            native_id = %intermediate.native_id,
                            %error,
                            "record quarantined"
                        );
                        rejected.push((
                            stream_idx,
                            RejectedRecord::new(
                                intermediate.source,
                                intermediate.position,
                                Some(intermediate.native_id.clone()),
                                &error,
                            ),
                        ));
                    }
                }
            }
        }

        let mut keep = vec![true; candidates.len()];
        self.resolve_same_source_duplicates(&candidates, &mut keep, &mut rejected);
        self.resolve_cross_source_conflicts(&candidates, &mut keep, &mut rejected);

        let mut accepted: Vec<CanonicalRecord> = candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(candidate, kept)| kept.then_some(candidate.record))
            .collect();
        if self.options.sort_by_requested_at {
            accepted.sort_by_key(|r| r.requested_at);
        }

        rejected.sort_by_key(|(stream, r)| (*stream, r.position));
        let outcome = ConsolidationOutcome {
            dataset: CanonicalDataset::new(accepted),
            rejected: rejected.into_iter().map(|(_, r)| r).collect(),
        };

        tracing::info!(
            streams = streams.len(),
            accepted = outcome.dataset.len(),
            rejected = outcome.rejected.len(),
            rejection_rate = outcome.rejection_rate(),
            "consolidation complete"
        );
        outcome
    }

    /// Parses, validates and normalizes one intermediate record.
    fn canonicalize(&self, rec: &IntermediateRecord) -> Result<CanonicalRecord, RecordError> {
        let requested_at = rec
            .requested_at
            .as_timestamp("requested_at")?
            .ok_or(RecordError::MissingField { field: "requested_at" })?;
        let resolved_at = rec.resolved_at.as_timestamp("resolved_at")?;

        if let Some(resolved) = resolved_at {
            if resolved < requested_at {
                return Err(RecordError::DataQuality(format!(
                    "resolved_at {} is earlier than requested_at {}",
                    resolved.to_rfc3339(),
                    requested_at.to_rfc3339()
                )));
            }
        }

        // A source-provided attention time wins over the timestamp difference.
        let attention_hours = match rec.attention_hours.as_f64("attention_hours")? {
            Some(hours) if hours < 0.0 => {
                return Err(RecordError::DataQuality(format!(
                    "negative attention time {hours}h"
                )));
            }
            Some(hours) => Some(hours),
            None => resolved_at.map(|resolved| CanonicalRecord::hours_between(requested_at, resolved)),
        };

        Ok(CanonicalRecord {
            request_id: CanonicalRecord::canonical_id(rec.source, &rec.native_id),
            source: rec.source,
            native_id: rec.native_id.clone(),
            requested_at,
            resolved_at,
            category: self.standardize_category(rec.category.as_deref()),
            status: derive_status(rec.status.as_deref(), resolved_at),
            attention_hours,
        })
    }

    fn standardize_category(&self, raw: Option<&str>) -> String {
        let label = raw.map(clean_label).unwrap_or_default();
        if label.is_empty() {
            return self.default_category.clone();
        }
        self.aliases
            .get(&label.to_lowercase())
            .cloned()
            .unwrap_or(label)
    }

    /// Repeats of a `(source, native_id)` key: identical repeats keep the first copy,
    /// contradictory repeats quarantine every copy.
    fn resolve_same_source_duplicates(
        &self,
        candidates: &[Candidate],
        keep: &mut [bool],
        rejected: &mut Vec<(usize, RejectedRecord)>,
    ) {
        let mut groups: HashMap<(SourceKind, &str), Vec<usize>> = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            groups
                .entry((candidate.record.source, candidate.record.native_id.as_str()))
                .or_default()
                .push(idx);
        }

        // Walk candidates in input order so the rejection detail is deterministic.
        for (idx, candidate) in candidates.iter().enumerate() {
            let key = (candidate.record.source, candidate.record.native_id.as_str());
            let Some(members) = groups.get(&key) else { continue };
            if members.len() < 2 || members[0] != idx {
                continue;
            }

            let first = &candidates[members[0]].record;
            let all_identical = members
                .iter()
                .all(|&m| same_content(first, &candidates[m].record));

            for (rank, &member) in members.iter().enumerate() {
                let error = if all_identical {
                    if rank == 0 {
                        continue;
                    }
                    RecordError::Duplicate {
                        request_id: first.request_id.clone(),
                    }
                } else {
                    RecordError::ConflictingDuplicate {
                        request_id: first.request_id.clone(),
                        detail: format!("{} copies in source disagree", members.len()),
                    }
                };
                self.quarantine(&candidates[member], &error, keep, member, rejected);
            }
        }
    }

    /// The same real-world request may surface in several systems. Records from
    /// different sources sharing a native id and request timestamp are one request:
    /// when their attention times agree the copy from the earliest stream is kept and
    /// the others are reported as duplicates; when they differ all copies are
    /// quarantined together, since no rule exists yet to pick a winner.
    fn resolve_cross_source_conflicts(
        &self,
        candidates: &[Candidate],
        keep: &mut [bool],
        rejected: &mut Vec<(usize, RejectedRecord)>,
    ) {
        let mut groups: HashMap<(&str, DateTime<Utc>), Vec<usize>> = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            if keep[idx] {
                groups
                    .entry((candidate.record.native_id.as_str(), candidate.record.requested_at))
                    .or_default()
                    .push(idx);
            }
        }

        for (idx, candidate) in candidates.iter().enumerate() {
            let key = (candidate.record.native_id.as_str(), candidate.record.requested_at);
            let Some(members) = groups.get(&key) else { continue };
            if members.len() < 2 || members[0] != idx {
                continue;
            }

            let first = &candidates[members[0]].record;
            let spans_sources = members
                .iter()
                .any(|&m| candidates[m].record.source != first.source);
            let hours_disagree = members
                .iter()
                .any(|&m| !same_hours(first.attention_hours, candidates[m].record.attention_hours));
            if !spans_sources {
                continue;
            }
            if !hours_disagree {
                // Same request reported by several systems: the first stream wins.
                tracing::debug!(request_id = %first.request_id, copies = members.len(), "cross-source duplicate merged");
                for &member in &members[1..] {
                    let error = RecordError::Duplicate {
                        request_id: first.request_id.clone(),
                    };
                    self.quarantine(&candidates[member], &error, keep, member, rejected);
                }
                continue;
            }

            let sources: Vec<String> = members
                .iter()
                .map(|&m| candidates[m].record.request_id.clone())
                .collect();
            tracing::warn!(records = ?sources, "cross-source duplicates disagree on attention time");

            for &member in members {
                let error = RecordError::ConflictingDuplicate {
                    request_id: candidates[member].record.request_id.clone(),
                    detail: format!("attention time differs across {}", sources.join(", ")),
                };
                self.quarantine(&candidates[member], &error, keep, member, rejected);
            }
        }
    }

    fn quarantine(
        &self,
        candidate: &Candidate,
        error: &RecordError,
        keep: &mut [bool],
        idx: usize,
        rejected: &mut Vec<(usize, RejectedRecord)>,
    ) {
        keep[idx] = false;
        rejected.push((
            candidate.stream,
            RejectedRecord::new(
                candidate.record.source,
                candidate.position,
                Some(candidate.record.native_id.clone()),
                error,
            ),
        ));
    }
}

/// Explicit statuses are normalized; a missing status is inferred from `resolved_at`.
fn derive_status(raw: Option<&str>, resolved_at: Option<DateTime<Utc>>) -> RequestStatus {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(status) => RequestStatus::normalize(status),
        None if resolved_at.is_some() => RequestStatus::Resolved,
        None => RequestStatus::Pending,
    }
}

/// Trims and collapses internal runs of whitespace.
fn clean_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn same_hours(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() <= HOURS_TOLERANCE,
        (None, None) => true,
        _ => false,
    }
}

fn same_content(a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
    a.requested_at == b.requested_at
        && a.resolved_at == b.resolved_at
        && a.category == b.category
        && a.status == b.status
        && same_hours(a.attention_hours, b.attention_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{RecordAdapter, SourceAdapter};
    use crate::error::ReasonCode;
    use core_types::{RawRecord, RawValue};
    use std::collections::BTreeMap;

    fn engine() -> ConsolidationEngine {
        ConsolidationEngine::new(&CategorySettings::default(), ConsolidationOptions::default())
    }

    fn raw(id: &str, requested: &str, resolved: Option<&str>, status: &str) -> RawRecord {
        let mut record = RawRecord::new()
            .with("id_solicitud", RawValue::text(id))
            .with("fecha_creacion", RawValue::text(requested))
            .with("tipo_solicitud", RawValue::text("Baches"))
            .with("estado", RawValue::text(status));
        if let Some(resolved) = resolved {
            record.insert("fecha_resolucion", RawValue::text(resolved));
        }
        record
    }

    fn stream(raws: &[RawRecord]) -> AdaptedStream {
        SourceAdapter::with_default_mapping(SourceKind::Solicitudes).adapt_all(raws)
    }

    #[test]
    fn derives_attention_hours_from_timestamps() {
        let outcome = engine().consolidate(&[stream(&[raw(
            "1",
            "2024-01-01 08:00:00",
            Some("2024-01-02 20:00:00"),
            "Resuelto",
        )])]);

        let record = &outcome.dataset.records()[0];
        assert_eq!(record.request_id, "solicitudes-1");
        assert_eq!(record.status, RequestStatus::Resolved);
        assert!((record.attention_hours.unwrap() - 36.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_attention_hours_are_trusted() {
        let record = raw("1", "2024-01-01 08:00:00", Some("2024-01-02 20:00:00"), "Resuelto")
            .with("tiempo_atencion", RawValue::text("30.5"));
        let outcome = engine().consolidate(&[stream(&[record])]);
        assert_eq!(outcome.dataset.records()[0].attention_hours, Some(30.5));
    }

    #[test]
    fn resolved_before_requested_is_quarantined() {
        let outcome = engine().consolidate(&[stream(&[
            raw("1", "2024-01-05 08:00:00", Some("2024-01-04 08:00:00"), "Resuelto"),
            raw("2", "2024-01-05 08:00:00", None, "Pendiente"),
        ])]);

        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].reason, ReasonCode::DataQualityError);
        assert_eq!(outcome.rejected[0].native_id.as_deref(), Some("1"));
    }

    #[test]
    fn malformed_records_do_not_abort_the_run() {
        let outcome = engine().consolidate(&[stream(&[
            raw("1", "not a date", None, "Pendiente"),
            raw("2", "", None, "Pendiente"),
            raw("3", "2024-01-01", None, "Pendiente")
                .with("tiempo_atencion", RawValue::text("quick")),
            raw("4", "2024-01-01", None, "Pendiente")
                .with("tiempo_atencion", RawValue::text("-3")),
            raw("5", "2024-01-01", None, "Pendiente"),
        ])]);

        let reasons: Vec<_> = outcome.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            [
                ReasonCode::UnparseableTimestamp,
                ReasonCode::MissingField,
                ReasonCode::InvalidNumber,
                ReasonCode::DataQualityError,
            ]
        );
        assert_eq!(outcome.dataset.len(), 1);
        assert!((outcome.rejection_rate() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn unknown_status_strings_map_to_unknown() {
        let outcome = engine().consolidate(&[stream(&[raw("1", "2024-01-01", None, "Escalado")])]);
        assert_eq!(outcome.dataset.records()[0].status, RequestStatus::Unknown);
    }

    #[test]
    fn missing_status_is_inferred_from_resolution() {
        let mut resolved = raw("1", "2024-01-01", Some("2024-01-02"), "");
        resolved.insert("estado", RawValue::Null);
        let pending = raw("2", "2024-01-01", None, " ");
        let outcome = engine().consolidate(&[stream(&[resolved, pending])]);

        let statuses: Vec<_> = outcome.dataset.iter().map(|r| r.status).collect();
        assert_eq!(statuses, [RequestStatus::Resolved, RequestStatus::Pending]);
    }

    #[test]
    fn identical_repeats_keep_first_and_report_the_rest() {
        let record = raw("7", "2024-01-01 10:00:00", None, "Pendiente");
        let outcome = engine().consolidate(&[stream(&[record.clone(), record])]);

        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].reason, ReasonCode::Duplicate);
        assert_eq!(outcome.rejected[0].position, 1);
    }

    #[test]
    fn contradictory_repeats_are_all_quarantined() {
        let outcome = engine().consolidate(&[stream(&[
            raw("7", "2024-01-01 10:00:00", None, "Pendiente"),
            raw("7", "2024-01-01 10:00:00", Some("2024-01-03 10:00:00"), "Resuelto"),
        ])]);

        assert!(outcome.dataset.is_empty());
        assert!(outcome
            .rejected
            .iter()
            .all(|r| r.reason == ReasonCode::ConflictingDuplicate));
        assert_eq!(outcome.rejected.len(), 2);
    }

    #[test]
    fn same_native_id_in_different_sources_is_disambiguated() {
        let solicitudes = stream(&[raw("10", "2024-01-01", None, "Pendiente")]);
        let seguimiento = SourceAdapter::with_default_mapping(SourceKind::Seguimiento).adapt_all(&[
            RawRecord::new()
                .with("id_seguimiento", RawValue::text("10"))
                .with("fecha_registro", RawValue::text("2024-02-01")),
        ]);

        let outcome = engine().consolidate(&[solicitudes, seguimiento]);
        let ids: Vec<_> = outcome.dataset.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, ["solicitudes-10", "seguimiento-10"]);
    }

    #[test]
    fn cross_source_duplicates_with_different_hours_are_quarantined() {
        let solicitudes = stream(&[raw("10", "2024-01-01 09:00:00", None, "Resuelto")
            .with("tiempo_atencion", RawValue::Float(12.0))]);
        let seguimiento = SourceAdapter::with_default_mapping(SourceKind::Seguimiento).adapt_all(&[
            RawRecord::new()
                .with("id_seguimiento", RawValue::text("10"))
                .with("fecha_registro", RawValue::text("2024-01-01 09:00:00"))
                .with("estado_actual", RawValue::text("Cerrado"))
                .with("tiempo_total", RawValue::Float(20.0)),
        ]);

        let outcome = engine().consolidate(&[solicitudes, seguimiento]);
        assert!(outcome.dataset.is_empty());
        let sources: Vec<_> = outcome.rejected.iter().map(|r| r.source).collect();
        assert_eq!(sources, [SourceKind::Solicitudes, SourceKind::Seguimiento]);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| r.reason == ReasonCode::ConflictingDuplicate));
    }

    #[test]
    fn agreeing_cross_source_duplicates_are_counted_once() {
        let solicitudes = stream(&[raw("10", "2024-01-01 09:00:00", None, "Resuelto")
            .with("tiempo_atencion", RawValue::Float(12.0))]);
        let seguimiento = SourceAdapter::with_default_mapping(SourceKind::Seguimiento).adapt_all(&[
            RawRecord::new()
                .with("id_seguimiento", RawValue::text("10"))
                .with("fecha_registro", RawValue::text("2024-01-01 09:00:00"))
                .with("estado_actual", RawValue::text("Cerrado"))
                .with("tiempo_total", RawValue::Float(12.0)),
        ]);

        let outcome = engine().consolidate(&[solicitudes, seguimiento]);
        let ids: Vec<_> = outcome.dataset.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, ["solicitudes-10"]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].source, SourceKind::Seguimiento);
        assert_eq!(outcome.rejected[0].reason, ReasonCode::Duplicate);
        assert!(outcome.rejected[0].detail.contains("solicitudes-10"));
    }

    #[test]
    fn categories_are_standardized_through_aliases() {
        let mut aliases = BTreeMap::new();
        aliases.insert("BACHES".to_string(), "Infraestructura".to_string());
        let categories = CategorySettings {
            aliases,
            default_category: "Sin categoría".to_string(),
        };
        let engine = ConsolidationEngine::new(&categories, ConsolidationOptions::default());

        let mut blank = raw("2", "2024-01-01", None, "Pendiente");
        blank.insert("tipo_solicitud", RawValue::text("   "));
        let mut spaced = raw("3", "2024-01-01", None, "Pendiente");
        spaced.insert("tipo_solicitud", RawValue::text("  Agua   Potable "));

        let outcome = engine.consolidate(&[stream(&[
            raw("1", "2024-01-01", None, "Pendiente"),
            blank,
            spaced,
        ])]);
        let categories: Vec<_> = outcome.dataset.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, ["Infraestructura", "Sin categoría", "Agua Potable"]);
    }

    #[test]
    fn optional_sort_orders_by_request_time() {
        let raws = [
            raw("1", "2024-03-01", None, "Pendiente"),
            raw("2", "2024-01-01", None, "Pendiente"),
            raw("3", "2024-02-01", None, "Pendiente"),
        ];

        let unsorted = engine().consolidate(&[stream(&raws)]);
        let ids: Vec<_> = unsorted.dataset.iter().map(|r| r.native_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);

        let sorting = ConsolidationEngine::new(
            &CategorySettings::default(),
            ConsolidationOptions {
                sort_by_requested_at: true,
            },
        );
        let sorted = sorting.consolidate(&[stream(&raws)]);
        let ids: Vec<_> = sorted.dataset.iter().map(|r| r.native_id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "1"]);
    }
}
