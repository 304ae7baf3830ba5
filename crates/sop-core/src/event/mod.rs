//! Bitácora de auditoría de la sesión (`logs`).

pub mod types;

pub use types::{LogEntry, LogKind};
