//! Estado de una sesión de procedimiento.
//!
//! `Session` refleja 1:1 el registro del Session Store (campos persistidos)
//! más el estado transitorio del episodio de bloqueo en curso (`block_ts`),
//! que no se persiste como campo propio: al reanudar se re-deriva de la
//! bitácora (ver `restore_block_from_logs`).
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::SESSION_PREFIX_LEN;
use crate::event::{LogEntry, LogKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    EnCurso,
    Bloqueado,
    Detenido,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::EnCurso => "EN_CURSO",
            SessionStatus::Bloqueado => "BLOQUEADO",
            SessionStatus::Detenido => "DETENIDO",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EN_CURSO" => Ok(SessionStatus::EnCurso),
            "BLOQUEADO" => Ok(SessionStatus::Bloqueado),
            "DETENIDO" => Ok(SessionStatus::Detenido),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// Registro de una decisión confirmada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts: DateTime<Utc>,
    pub nodo: String,
    pub titulo: String,
    pub seleccion: String,
    pub next: String,
}

/// Episodio de bloqueo ya resuelto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub ts_inicio: DateTime<Utc>,
    pub ts_fin: DateTime<Utc>,
    pub nodo: String,
    pub titulo: String,
    pub motivos: Vec<String>,
    #[serde(default)]
    pub detalle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub pro_id: String,
    #[serde(default)]
    pub area_id: String,
    pub estado: SessionStatus,
    pub current_node: String,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub decisiones: Vec<DecisionRecord>,
    #[serde(default)]
    pub bloqueos: Vec<BlockRecord>,
    /// Valores por key global de la sesión (no por nodo).
    #[serde(default)]
    pub inputs: IndexMap<String, String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Inicio del episodio de bloqueo abierto (`None` = no bloqueado).
    #[serde(skip)]
    pub block_ts: Option<DateTime<Utc>>,
}

impl Session {
    /// Sesión nueva en el nodo inicial, con historia y bitácora vacías.
    pub fn new(pro_id: impl Into<String>, area_id: impl Into<String>, start_node: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { session_id: Uuid::new_v4(),
               pro_id: pro_id.into(),
               area_id: area_id.into(),
               estado: SessionStatus::EnCurso,
               current_node: start_node.into(),
               history: Vec::new(),
               decisiones: Vec::new(),
               bloqueos: Vec::new(),
               inputs: IndexMap::new(),
               logs: Vec::new(),
               created_at: now,
               updated_at: now,
               block_ts: None }
    }

    pub fn is_blocked(&self) -> bool {
        self.block_ts.is_some()
    }

    /// Prefijo corto del id (usado en nombres de archivo y en pantalla).
    pub fn short_id(&self) -> String {
        self.session_id.to_string().chars().take(SESSION_PREFIX_LEN).collect()
    }

    /// Agrega una entrada de bitácora con el nodo y estado actuales.
    pub(crate) fn log(&mut self, tipo: LogKind, data: Value, now: DateTime<Utc>) {
        self.logs.push(LogEntry { ts: now,
                                  tipo,
                                  nodo: self.current_node.clone(),
                                  estado: self.estado,
                                  data });
    }

    /// Re-deriva el bloqueo abierto a partir de la bitácora persistida.
    ///
    /// Si el estado persistido es `BLOQUEADO`, el episodio sigue abierto: su
    /// inicio es el último `BLOQUEADO_INICIO` sin `BLOQUEADO_FIN` posterior.
    /// Si la bitácora no lo contiene se usa `updated_at`. En cualquier otro
    /// estado no hay bloqueo abierto.
    pub fn restore_block_from_logs(&mut self) {
        if self.estado != SessionStatus::Bloqueado {
            self.block_ts = None;
            return;
        }
        let open = self.logs
                       .iter()
                       .rev()
                       .take_while(|e| e.tipo != LogKind::BloqueadoFin)
                       .find(|e| e.tipo == LogKind::BloqueadoInicio)
                       .map(|e| e.ts);
        if open.is_none() {
            log::warn!("session {} is BLOQUEADO without an open BLOQUEADO_INICIO; using updated_at",
                       self.session_id);
        }
        self.block_ts = Some(open.unwrap_or(self.updated_at));
    }
}

/// Cuerpo del reemplazo (`PUT /session/{id}`): sólo los campos mutables.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate<'a> {
    pub estado: SessionStatus,
    pub current_node: &'a str,
    pub history: &'a [String],
    pub decisiones: &'a [DecisionRecord],
    pub bloqueos: &'a [BlockRecord],
    pub inputs: &'a IndexMap<String, String>,
    pub logs: &'a [LogEntry],
}

impl<'a> From<&'a Session> for SessionUpdate<'a> {
    fn from(s: &'a Session) -> Self {
        Self { estado: s.estado,
               current_node: &s.current_node,
               history: &s.history,
               decisiones: &s.decisiones,
               bloqueos: &s.bloqueos,
               inputs: &s.inputs,
               logs: &s.logs }
    }
}

impl SessionUpdate<'_> {
    /// Aplica el reemplazo sobre un registro almacenado.
    pub fn apply_to(&self, target: &mut Session, updated_at: DateTime<Utc>) {
        target.estado = self.estado;
        target.current_node = self.current_node.to_string();
        target.history = self.history.to_vec();
        target.decisiones = self.decisiones.to_vec();
        target.bloqueos = self.bloqueos.to_vec();
        target.inputs = self.inputs.clone();
        target.logs = self.logs.to_vec();
        target.updated_at = updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn entry(tipo: LogKind, ts: DateTime<Utc>) -> LogEntry {
        LogEntry { ts, tipo, nodo: "S1".into(), estado: SessionStatus::Bloqueado, data: json!({}) }
    }

    #[test]
    fn status_round_trips_through_text() {
        for st in [SessionStatus::EnCurso, SessionStatus::Bloqueado, SessionStatus::Detenido] {
            assert_eq!(st.as_str().parse::<SessionStatus>(), Ok(st));
        }
        assert!("PAUSADO".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn block_state_is_not_serialized() {
        let mut s = Session::new("PRO141", "logistica", "S0", Utc::now());
        s.block_ts = Some(Utc::now());
        let v = serde_json::to_value(&s).unwrap();
        assert!(v.get("block_ts").is_none());
        let back: Session = serde_json::from_value(v).unwrap();
        assert!(!back.is_blocked());
    }

    #[test]
    fn restore_picks_last_open_block() {
        let t0 = Utc::now();
        let mut s = Session::new("PRO141", "logistica", "S1", t0);
        s.estado = SessionStatus::Bloqueado;
        s.logs = vec![entry(LogKind::BloqueadoInicio, t0),
                      entry(LogKind::BloqueadoFin, t0 + Duration::seconds(5)),
                      entry(LogKind::RehacerPaso, t0 + Duration::seconds(5)),
                      entry(LogKind::BloqueadoInicio, t0 + Duration::seconds(20))];
        s.restore_block_from_logs();
        assert_eq!(s.block_ts, Some(t0 + Duration::seconds(20)));
    }

    #[test]
    fn restore_without_open_episode_keeps_session_blocked() {
        let t0 = Utc::now();
        let mut s = Session::new("PRO141", "logistica", "S1", t0);
        s.estado = SessionStatus::Bloqueado;
        s.updated_at = t0 + Duration::seconds(3);
        s.restore_block_from_logs();
        assert_eq!(s.block_ts, Some(s.updated_at));

        s.estado = SessionStatus::EnCurso;
        s.restore_block_from_logs();
        assert!(!s.is_blocked());
    }

    #[test]
    fn short_id_is_eight_chars() {
        let s = Session::new("PRO141", "", "S0", Utc::now());
        assert_eq!(s.short_id().len(), 8);
        assert!(s.session_id.to_string().starts_with(&s.short_id()));
    }
}
