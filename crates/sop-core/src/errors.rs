//! Errores del motor de procedimientos.
//!
//! Taxonomía:
//! - `ActionRejected`: validación de una acción del usuario. Se recupera
//!   localmente: la acción se aborta sin mutar estado ni persistir.
//! - `GraphError`: carga/validación del grafo de nodos de un procedimiento.
//! - `StoreError`: fallos del Session Store (creación, lectura, reemplazo,
//!   exportación).
//! - `RegistryError`: fallos del registro local de última sesión.
//! - `EngineError`: envoltorio que devuelve el controlador de sesión.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionRejected {
    #[error("required field: \"{label}\"")]
    MissingField { key: String, label: String },
    #[error("complete every checklist item before advancing (pending: {pending:?})")]
    ChecklistIncomplete { pending: Vec<usize> },
    #[error("select an option before continuing")]
    NoOptionSelected,
    #[error("option {0} does not exist on this decision")]
    UnknownOption(usize),
    #[error("step is blocked; resolve the block first")]
    Blocked,
    #[error("step is not blocked")]
    NotBlocked,
    #[error("select at least one block reason")]
    NoBlockReason,
    #[error("unknown block reason: {0}")]
    UnknownBlockReason(String),
    #[error("a detail is required when selecting '{0}'")]
    MissingBlockDetail(String),
    #[error("there is no previous step")]
    NoHistory,
    #[error("procedure reached an end node; only export is available")]
    Terminal,
    #[error("procedure does not declare a stop affordance")]
    StopUnavailable,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON in {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid procedure document: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),
    #[error("procedure graph is empty")]
    EmptyGraph,
    #[error("node key '{key}' declares id '{id}'")]
    IdMismatch { key: String, id: String },
    #[error("start node '{0}' not present in graph")]
    MissingStartNode(String),
    #[error("node '{from}' points to unknown node '{to}'")]
    DanglingEdge { from: String, to: String },
    #[error("decision node '{0}' has no options")]
    EmptyDecision(String),
    #[error("stop node '{0}' not present in graph")]
    MissingStopNode(String),
    #[error("stop node '{0}' is not an end node")]
    StopNodeNotEnd(String),
    #[error("node graph contains a cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(Uuid),
    #[error("session record could not be encoded/decoded: {0}")]
    Serialization(String),
    #[error("session store unavailable: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry io: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry format: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] ActionRejected),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl EngineError {
    /// Devuelve el rechazo de validación si el error proviene de uno.
    pub fn as_rejection(&self) -> Option<&ActionRejected> {
        match self {
            EngineError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}
