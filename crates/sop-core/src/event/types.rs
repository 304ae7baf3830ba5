//! Tipos de evento de la bitácora y estructura `LogEntry`.
//!
//! Rol en el flujo:
//! - Cada acción aceptada por el motor agrega una o más entradas a
//!   `Session::logs`, que es append-only.
//! - La bitácora permite re-derivar el estado transitorio (bloqueo abierto)
//!   al reanudar una sesión y forma parte del artefacto exportado.
//! - Los nombres serializados (`AVANZA`, `DECISION`, ...) son el contrato
//!   observable con el Session Store y con la exportación.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    /// Avance desde un nodo task hacia su `next`.
    Avanza,
    /// Decisión confirmada en un nodo decision.
    Decision,
    /// Apertura de un episodio de bloqueo (rechazo del paso).
    BloqueadoInicio,
    /// Cierre del episodio de bloqueo con sus motivos.
    BloqueadoFin,
    /// El paso bloqueado vuelve a estar disponible para rehacerse.
    RehacerPaso,
    /// Retroceso al nodo anterior de `history`.
    Volver,
    /// Detención del procedimiento hacia su nodo de STOP.
    Stop,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Avanza => "AVANZA",
            LogKind::Decision => "DECISION",
            LogKind::BloqueadoInicio => "BLOQUEADO_INICIO",
            LogKind::BloqueadoFin => "BLOQUEADO_FIN",
            LogKind::RehacerPaso => "REHACER_PASO",
            LogKind::Volver => "VOLVER",
            LogKind::Stop => "STOP",
        }
    }
}

/// Entrada de auditoría. `nodo` y `estado` reflejan la sesión en el momento
/// exacto en que se escribió la entrada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub tipo: LogKind,
    pub nodo: String,
    pub estado: SessionStatus,
    #[serde(default)]
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_serialize_with_audit_names() {
        for kind in [LogKind::Avanza,
                     LogKind::Decision,
                     LogKind::BloqueadoInicio,
                     LogKind::BloqueadoFin,
                     LogKind::RehacerPaso,
                     LogKind::Volver,
                     LogKind::Stop]
        {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }

    #[test]
    fn entry_without_data_defaults_to_null() {
        let entry: LogEntry = serde_json::from_value(json!({
            "ts": "2024-05-02T10:00:00Z",
            "tipo": "REHACER_PASO",
            "nodo": "S3",
            "estado": "EN_CURSO"
        })).expect("log entry");
        assert_eq!(entry.tipo, LogKind::RehacerPaso);
        assert_eq!(entry.estado, SessionStatus::EnCurso);
        assert!(entry.data.is_null());
    }
}
