//! Session Store: un registro durable por `session_id`.
//!
//! Contrato (equivalente a la API REST del servicio):
//! - `create`  ↔ `POST /session {pro_id, area_id}`
//! - `get`     ↔ `GET /session/{id}` (`None` = not found)
//! - `replace` ↔ `PUT /session/{id}` con los campos mutables
//! - `export`  ↔ `GET /session/{id}/export`
//!
//! Sin versionado ni concurrencia optimista: gana la última escritura.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::model::{Session, SessionUpdate};

pub trait SessionStore {
    /// Crea un registro nuevo situado en `start_node`.
    fn create(&mut self, pro_id: &str, area_id: &str, start_node: &str) -> Result<Session, StoreError>;
    /// Lee el registro completo. El bloqueo abierto no forma parte del
    /// registro: la sesión devuelta nunca viene bloqueada.
    fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;
    /// Reemplaza los campos mutables y devuelve el nuevo `updated_at`.
    fn replace(&mut self, session_id: Uuid, update: &SessionUpdate<'_>) -> Result<DateTime<Utc>, StoreError>;
    /// Instantánea completa para descarga.
    fn export(&self, session_id: Uuid) -> Result<SessionSnapshot, StoreError>;
}

/// Registro completo + marca de exportación.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: Session,
    pub export_ts: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(session: Session, export_ts: DateTime<Utc>) -> Self {
        Self { session, export_ts }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    pub inner: HashMap<Uuid, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&mut self, pro_id: &str, area_id: &str, start_node: &str) -> Result<Session, StoreError> {
        let session = Session::new(pro_id, area_id, start_node, Utc::now());
        self.inner.insert(session.session_id, session.clone());
        Ok(session)
    }

    fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.get(&session_id).cloned().map(|mut s| {
                                                   s.block_ts = None;
                                                   s
                                               }))
    }

    fn replace(&mut self, session_id: Uuid, update: &SessionUpdate<'_>) -> Result<DateTime<Utc>, StoreError> {
        let stored = self.inner.get_mut(&session_id).ok_or(StoreError::NotFound(session_id))?;
        let now = Utc::now();
        update.apply_to(stored, now);
        Ok(now)
    }

    fn export(&self, session_id: Uuid) -> Result<SessionSnapshot, StoreError> {
        let session = self.get(session_id)?.ok_or(StoreError::NotFound(session_id))?;
        Ok(SessionSnapshot::new(session, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_replace_export() {
        let mut store = InMemorySessionStore::new();
        let created = store.create("PRO141", "logistica", "S0").unwrap();
        assert_eq!(created.current_node, "S0");
        assert!(created.history.is_empty());

        let mut moved = created.clone();
        moved.history.push("S0".into());
        moved.current_node = "S1".into();
        moved.inputs.insert("responsable".into(), "Ana".into());
        let updated_at = store.replace(created.session_id, &SessionUpdate::from(&moved)).unwrap();
        assert!(updated_at >= created.updated_at);

        let read = store.get(created.session_id).unwrap().expect("stored");
        assert_eq!(read.current_node, "S1");
        assert_eq!(read.history, vec!["S0".to_string()]);
        assert_eq!(read.inputs.get("responsable").map(String::as_str), Some("Ana"));
        assert_eq!(read.created_at, created.created_at);

        let snap = store.export(created.session_id).unwrap();
        assert_eq!(snap.session.session_id, created.session_id);
        let v = serde_json::to_value(&snap).unwrap();
        assert!(v.get("export_ts").is_some());
        assert_eq!(v["current_node"], "S1");
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let mut store = InMemorySessionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.get(id), Ok(None));
        let s = Session::new("P", "", "S0", Utc::now());
        assert_eq!(store.replace(id, &SessionUpdate::from(&s)), Err(StoreError::NotFound(id)));
        assert_eq!(store.export(id).unwrap_err(), StoreError::NotFound(id));
    }
}
