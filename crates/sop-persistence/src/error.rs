//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas y de ahí a
//! `StoreError` del core.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use sop_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("not found")]
    NotFound,
    #[error("database busy (retryable): {0}")]
    Busy(String),
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("invalid stored value in column {column}: {message}")]
    Corrupt { column: &'static str, message: String },
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::Busy(info.message().to_string()),
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => {
                    let message = info.message().to_string();
                    if is_busy_message(&message) {
                        Self::Busy(message)
                    } else {
                        Self::Unknown(format!("db error kind {other:?}: {message}"))
                    }
                }
            },
            DieselError::DeserializationError(e) => Self::Unknown(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            DieselError::QueryBuilderError(e) => Self::Unknown(format!("query builder: {e}")),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

/// SQLite reporta bloqueos como errores genéricos con texto.
pub(crate) fn is_busy_message(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("database is locked") || m.contains("database table is locked") || m.contains("busy")
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Corrupt { .. } => StoreError::Serialization(err.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_database_is_classified_busy() {
        assert!(is_busy_message("database is locked"));
        assert!(is_busy_message("SQLITE_BUSY: cannot start a transaction"));
        assert!(!is_busy_message("no such table: sessions"));
    }

    #[test]
    fn corrupt_rows_map_to_serialization_errors() {
        let err = PersistenceError::Corrupt { column: "logs", message: "expected array".into() };
        assert!(matches!(StoreError::from(err), StoreError::Serialization(_)));
        assert!(matches!(StoreError::from(PersistenceError::Busy("x".into())), StoreError::Backend(_)));
    }
}
