//! Procedimientos: descriptor validado y proveedores de grafos.

pub mod catalog;
pub mod descriptor;

pub use catalog::{Area, Catalog, FsCatalog, GraphProvider, InMemoryGraphProvider};
pub use descriptor::{Procedure, ProcedureConfig};
