//! Registro local de la última sesión por procedimiento.
//!
//! Equivale al valor `hmi_session_<PRO>` que el cliente guarda para ofrecer
//! reanudación automática. No tiene expiración; `reset` lo limpia.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::errors::RegistryError;

pub trait SessionRegistry {
    fn last(&self, pro_id: &str) -> Option<Uuid>;
    fn remember(&mut self, pro_id: &str, session_id: Uuid) -> Result<(), RegistryError>;
    fn forget(&mut self, pro_id: &str) -> Result<(), RegistryError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionRegistry {
    inner: HashMap<String, Uuid>,
}

impl InMemorySessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    fn last(&self, pro_id: &str) -> Option<Uuid> {
        self.inner.get(pro_id).copied()
    }

    fn remember(&mut self, pro_id: &str, session_id: Uuid) -> Result<(), RegistryError> {
        self.inner.insert(pro_id.to_string(), session_id);
        Ok(())
    }

    fn forget(&mut self, pro_id: &str) -> Result<(), RegistryError> {
        self.inner.remove(pro_id);
        Ok(())
    }
}

/// Registro persistido como objeto JSON `{ "<PRO>": "<uuid>" }`.
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    inner: BTreeMap<String, Uuid>,
}

impl JsonFileRegistry {
    /// Abre el archivo si existe; si no, parte vacío y lo crea al primer
    /// `remember`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let inner = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.inner)?)?;
        Ok(())
    }
}

impl SessionRegistry for JsonFileRegistry {
    fn last(&self, pro_id: &str) -> Option<Uuid> {
        self.inner.get(pro_id).copied()
    }

    fn remember(&mut self, pro_id: &str, session_id: Uuid) -> Result<(), RegistryError> {
        self.inner.insert(pro_id.to_string(), session_id);
        self.flush()
    }

    fn forget(&mut self, pro_id: &str) -> Result<(), RegistryError> {
        if self.inner.remove(pro_id).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
