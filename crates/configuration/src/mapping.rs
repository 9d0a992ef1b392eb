use core_types::SourceKind;
use serde::{Deserialize, Serialize};

/// The static column mapping for one source: which native column feeds each canonical
/// field.
///
/// `request_id` and `requested_at` are required and always name a column. The optional
/// fields may be left unmapped:
/// - `resolved_at`: the source never records a resolution date.
/// - `category`: every record gets the configured default category.
/// - `status`: derived from the presence of `resolved_at`.
/// - `attention_hours`: derived from the two timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub request_id: String,
    pub requested_at: String,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attention_hours: Option<String>,
}

impl ColumnMapping {
    /// The mapping tables of the three municipal systems.
    pub fn default_for(kind: SourceKind) -> Self {
        let (id, requested, resolved, category, status, hours) = match kind {
            SourceKind::Solicitudes => (
                "id_solicitud",
                "fecha_creacion",
                "fecha_resolucion",
                "tipo_solicitud",
                "estado",
                "tiempo_atencion",
            ),
            SourceKind::AtencionCiudadana => (
                "id_atencion",
                "fecha_atencion",
                "fecha_cierre",
                "categoria",
                "estatus",
                "duracion",
            ),
            SourceKind::Seguimiento => (
                "id_seguimiento",
                "fecha_registro",
                "fecha_finalizacion",
                "tipo",
                "estado_actual",
                "tiempo_total",
            ),
        };

        Self {
            request_id: id.to_string(),
            requested_at: requested.to_string(),
            resolved_at: Some(resolved.to_string()),
            category: Some(category.to_string()),
            status: Some(status.to_string()),
            attention_hours: Some(hours.to_string()),
        }
    }

    /// Every native column named by this mapping, required ones first.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = vec![self.request_id.as_str(), self.requested_at.as_str()];
        columns.extend(
            [
                &self.resolved_at,
                &self.category,
                &self.status,
                &self.attention_hours,
            ]
            .into_iter()
            .flatten()
            .map(String::as_str),
        );
        columns
    }
}
