//! Colaboradores persistentes: Session Store y registro local de sesiones.

pub mod registry;
pub mod store;

pub use registry::{InMemorySessionRegistry, JsonFileRegistry, SessionRegistry};
pub use store::{InMemorySessionStore, SessionSnapshot, SessionStore};
