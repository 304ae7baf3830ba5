//! sop-core: motor de sesión para recorridos de procedimientos (SOP)
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod procedure;
pub mod repo;

pub use engine::{evaluate, Action, Applied, ExportArtifact, FormSnapshot, Outcome, Progress, SessionController, SessionInit, Summary, TimelineEntry};
pub use errors::{ActionRejected, EngineError, GraphError, RegistryError, StoreError};
pub use event::{LogEntry, LogKind};
pub use model::{BlockRecord, DecisionRecord, Node, NodeKind, Session, SessionStatus, SessionUpdate};
pub use procedure::{Catalog, FsCatalog, GraphProvider, InMemoryGraphProvider, Procedure, ProcedureConfig};
pub use repo::{InMemorySessionRegistry, InMemorySessionStore, JsonFileRegistry, SessionRegistry, SessionSnapshot, SessionStore};
