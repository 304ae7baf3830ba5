#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::json;
use sop_core::errors::StoreError;
use sop_core::{FormSnapshot, InMemorySessionStore, Procedure, Session, SessionSnapshot, SessionStore, SessionUpdate};
use uuid::Uuid;

pub const MOTIVOS: [&str; 3] = ["Falta información", "Sistema no disponible", "Otro"];

pub fn config() -> serde_json::Value {
    json!({
        "nombre": "Baja de materiales obsoletos",
        "has_stop": true,
        "flow_order": ["S0_alcance", "S1_decision", "S2_baja", "END_OK"],
        "motivos_bloqueo": MOTIVOS
    })
}

pub fn nodes() -> serde_json::Value {
    json!({
        "S0_alcance": {
            "type": "task",
            "titulo": "Definir alcance",
            "rol": "Planificador",
            "acciones": ["Generar listado de materiales sin movimiento"],
            "inputs": [{"key": "responsable", "label": "Responsable", "required": true}],
            "checklist": ["Listado generado", "Ubicación validada"],
            "next": "S1_decision"
        },
        "S1_decision": {
            "type": "decision",
            "titulo": "¿El material es reutilizable?",
            "rol": "Supervisor",
            "opciones": [
                {"label": "No", "next": "S2_baja"},
                {"label": "Sí", "next": "S2_reuso"}
            ]
        },
        "S2_baja": {
            "type": "task",
            "titulo": "Tramitar baja contable",
            "rol": "Contabilidad",
            "inputs": [{"key": "folio", "label": "Folio de baja"}],
            "checklist": ["Acta firmada", "Fotos (si aplica)"],
            "next": "END_OK"
        },
        "S2_reuso": {
            "type": "task",
            "titulo": "Reasignar material",
            "rol": "Logística",
            "next": "END_OK"
        },
        "END_OK": {
            "type": "end",
            "titulo": "Procedimiento completado",
            "mensaje": "Material dado de baja",
            "inputs": [{"key": "observaciones", "label": "Observaciones"}]
        },
        "END_STOP": {
            "type": "end",
            "titulo": "Procedimiento detenido",
            "estado_final": "DETENIDO"
        }
    })
}

pub fn procedure() -> Procedure {
    Procedure::from_json("PRO141", config(), nodes()).expect("fixture procedure")
}

/// Formulario válido para `S0_alcance`.
pub fn scope_form() -> FormSnapshot {
    FormSnapshot::new().value("responsable", "Ana Ruiz").check_all(2)
}

/// Store en memoria cuyas escrituras pueden fallar a voluntad; cuenta los
/// `replace` exitosos.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemorySessionStore,
    pub fail_writes: Rc<Cell<bool>>,
    pub fail_reads: Rc<Cell<bool>>,
    pub replaces: Rc<Cell<usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for FlakyStore {
    fn create(&mut self, pro_id: &str, area_id: &str, start_node: &str) -> Result<Session, StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Backend("offline".into()));
        }
        self.inner.create(pro_id, area_id, start_node)
    }

    fn get(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        if self.fail_reads.get() {
            return Err(StoreError::Backend("offline".into()));
        }
        self.inner.get(session_id)
    }

    fn replace(&mut self, session_id: Uuid, update: &SessionUpdate<'_>) -> Result<DateTime<Utc>, StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Backend("offline".into()));
        }
        let updated_at = self.inner.replace(session_id, update)?;
        self.replaces.set(self.replaces.get() + 1);
        Ok(updated_at)
    }

    fn export(&self, session_id: Uuid) -> Result<SessionSnapshot, StoreError> {
        if self.fail_reads.get() {
            return Err(StoreError::Backend("offline".into()));
        }
        self.inner.export(session_id)
    }
}
