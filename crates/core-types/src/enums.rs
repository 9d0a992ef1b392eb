use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The operational systems that feed the consolidated dataset.
///
/// The set is closed: adding a source means adding a variant here, a default
/// column mapping in `configuration`, and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// PostgreSQL `solicitudes` table.
    Solicitudes,
    /// MySQL `atencion_ciudadana` table.
    AtencionCiudadana,
    /// SQL Server `seguimiento` table.
    Seguimiento,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Solicitudes,
        SourceKind::AtencionCiudadana,
        SourceKind::Seguimiento,
    ];

    /// Short, stable code used as the `request_id` prefix and in exported files.
    pub fn code(&self) -> &'static str {
        match self {
            SourceKind::Solicitudes => "solicitudes",
            SourceKind::AtencionCiudadana => "atencion_ciudadana",
            SourceKind::Seguimiento => "seguimiento",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidInput("source".to_string(), s.to_string()))
    }
}

/// The unified request status. Every source vocabulary collapses onto these three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Resolved,
    Pending,
    Unknown,
}

const RESOLVED_TERMS: &[&str] = &[
    "resuelto", "resuelta", "cerrado", "cerrada", "finalizado", "finalizada",
    "completado", "completada", "atendido", "atendida", "concluido", "concluida",
    "resolved", "closed", "done", "completed", "finished",
];

const PENDING_TERMS: &[&str] = &[
    "pendiente", "abierto", "abierta", "en proceso", "en_proceso", "en espera",
    "en_espera", "en tramite", "en trámite", "asignado", "asignada", "nuevo", "nueva",
    "pending", "open", "in progress", "in_progress", "new", "assigned", "waiting",
];

impl RequestStatus {
    /// Maps a free-form source status onto the unified enum.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. Anything
    /// outside the known vocabularies becomes `Unknown`; this never fails.
    pub fn normalize(raw: &str) -> Self {
        let term = raw.trim().to_lowercase();
        if RESOLVED_TERMS.contains(&term.as_str()) {
            RequestStatus::Resolved
        } else if PENDING_TERMS.contains(&term.as_str()) {
            RequestStatus::Pending
        } else {
            RequestStatus::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Resolved => "Resolved",
            RequestStatus::Pending => "Pending",
            RequestStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
