//! Motor de sesión: evaluación pura de transiciones, controlador con la API
//! de acciones, vistas de lectura y composición del artefacto exportado.

pub mod controller;
pub mod export;
pub mod transition;
pub mod view;

pub use controller::{Applied, SessionController, SessionInit};
pub use export::{ExportArtifact, ExportDocument};
pub use transition::{evaluate, Action, FormSnapshot, Outcome};
pub use view::{timeline, Progress, Summary, TimelineEntry};
