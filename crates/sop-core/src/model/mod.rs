//! Modelo de datos: nodos del procedimiento y estado de sesión.

pub mod node;
pub mod session;

pub use node::{is_checklist_exempt, DecisionNode, DecisionOption, EndNode, InputSpec, Node, NodeGraph, NodeKind, TaskNode};
pub use session::{BlockRecord, DecisionRecord, Session, SessionStatus, SessionUpdate};
