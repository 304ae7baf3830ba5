//! Procedure Graph Provider.
//!
//! Un `GraphProvider` entrega el `Procedure` validado de un id dado; se carga
//! una sola vez por inicio de sesión. `FsCatalog` lee la disposición en
//! disco:
//!
//! ```text
//! <root>/areas.json          { "areas": [...], "pros": { "<PRO>": {...} } }
//! <root>/<PRO>/nodos.json    { "<node_id>": { "type": ..., ... }, ... }
//! ```
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Procedure, ProcedureConfig};
use crate::errors::GraphError;
use crate::model::Node;

pub const CATALOG_FILE: &str = "areas.json";
pub const NODES_FILE: &str = "nodos.json";

/// Fuente de grafos de procedimiento.
pub trait GraphProvider {
    fn load(&self, pro_id: &str) -> Result<Procedure, GraphError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Area {
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub pros: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub pros: IndexMap<String, ProcedureConfig>,
}

impl Catalog {
    /// Área que lista al procedimiento (la primera, si hay varias).
    pub fn area_of(&self, pro_id: &str) -> Option<&Area> {
        self.areas.iter().find(|a| a.pros.iter().any(|p| p == pro_id))
    }
}

/// Catálogo respaldado por archivos JSON.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
    catalog: Catalog,
}

impl FsCatalog {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, GraphError> {
        let root = root.into();
        let catalog: Catalog = read_json(&root.join(CATALOG_FILE))?;
        log::debug!("catalog opened root={} pros={}", root.display(), catalog.pros.len());
        Ok(Self { root, catalog })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl GraphProvider for FsCatalog {
    fn load(&self, pro_id: &str) -> Result<Procedure, GraphError> {
        let config = self.catalog
                         .pros
                         .get(pro_id)
                         .cloned()
                         .ok_or_else(|| GraphError::UnknownProcedure(pro_id.to_string()))?;
        let nodes: IndexMap<String, Node> = read_json(&self.root.join(pro_id).join(NODES_FILE))?;
        let procedure = Procedure::from_parts(pro_id, config, nodes)?;
        log::debug!("procedure loaded id={} nodes={} hash={}",
                    procedure.id,
                    procedure.nodes.len(),
                    procedure.definition_hash);
        Ok(procedure)
    }
}

/// Proveedor en memoria (tests, embebidos).
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphProvider {
    inner: HashMap<String, Procedure>,
}

impl InMemoryGraphProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, procedure: Procedure) {
        self.inner.insert(procedure.id.clone(), procedure);
    }
}

impl GraphProvider for InMemoryGraphProvider {
    fn load(&self, pro_id: &str) -> Result<Procedure, GraphError> {
        self.inner.get(pro_id).cloned().ok_or_else(|| GraphError::UnknownProcedure(pro_id.to_string()))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, GraphError> {
    let raw = fs::read_to_string(path).map_err(|source| GraphError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw).map_err(|source| GraphError::Parse { path: path.to_path_buf(), source })
}
