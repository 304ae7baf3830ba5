//! Controlador de sesión.
//!
//! Único dueño del estado mutable de una corrida: el procedimiento cargado,
//! la sesión actual, el Session Store y el registro local de reanudación.
//! La capa de presentación sólo ve la API de acciones y accesores de
//! lectura.
//!
//! Política de persistencia (fail-closed): cada transición evalúa una sesión
//! candidata, la persiste y sólo entonces reemplaza el estado en memoria. Si
//! el store falla, el estado en memoria sigue igual al persistido y el error
//! se devuelve; el usuario puede reintentar la misma acción.
use chrono::Utc;
use log::{debug, error, warn};

use super::export::ExportArtifact;
use super::transition::{evaluate, Action, FormSnapshot, Outcome};
use super::view::{timeline, Progress, Summary, TimelineEntry};
use crate::errors::EngineError;
use crate::model::{Node, Session, SessionUpdate};
use crate::procedure::Procedure;
use crate::repo::{SessionRegistry, SessionStore};

/// Origen de la sesión activa tras `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInit {
    Fresh,
    Resumed,
}

/// Resultado de una acción aceptada.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Moved,
    Unchanged,
    Exported(ExportArtifact),
}

#[derive(Debug)]
pub struct SessionController<S, R>
    where S: SessionStore,
          R: SessionRegistry
{
    procedure: Procedure,
    area_id: String,
    session: Session,
    init: SessionInit,
    store: S,
    registry: R,
}

impl<S, R> SessionController<S, R>
    where S: SessionStore,
          R: SessionRegistry
{
    /// Reanuda la última sesión recordada para el procedimiento o crea una
    /// nueva en el nodo inicial.
    ///
    /// Una sesión recordada se reanuda sólo si el store la devuelve y su
    /// `pro_id` coincide. Fallos de lectura al reanudar no son fatales: se
    /// registran y se crea una sesión nueva.
    pub fn start(procedure: Procedure, area_id: impl Into<String>, mut store: S, mut registry: R) -> Result<Self, EngineError> {
        let area_id = area_id.into();
        let (session, init) = match Self::resume(&procedure, &store, &registry) {
            Some(session) => (session, SessionInit::Resumed),
            None => {
                let session = store.create(&procedure.id, &area_id, &procedure.start_node)?;
                registry.remember(&procedure.id, session.session_id)?;
                debug!("session created pro={} id={} node={}",
                       procedure.id,
                       session.session_id,
                       session.current_node);
                (session, SessionInit::Fresh)
            }
        };
        Ok(Self { procedure,
                  area_id,
                  session,
                  init,
                  store,
                  registry })
    }

    fn resume(procedure: &Procedure, store: &S, registry: &R) -> Option<Session> {
        let id = registry.last(&procedure.id)?;
        let mut session = match store.get(id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                debug!("remembered session {id} not found; starting fresh");
                return None;
            }
            Err(e) => {
                warn!("cannot resume session {id}: {e}");
                return None;
            }
        };
        if session.pro_id != procedure.id {
            warn!("remembered session {id} belongs to {} not {}", session.pro_id, procedure.id);
            return None;
        }
        session.restore_block_from_logs();
        if procedure.node(&session.current_node).is_none() {
            warn!("resumed session {id} points to unknown node {}", session.current_node);
        }
        debug!("session resumed pro={} id={} node={} estado={}",
               procedure.id,
               id,
               session.current_node,
               session.estado);
        Some(session)
    }

    pub fn advance(&mut self, form: FormSnapshot) -> Result<Applied, EngineError> {
        self.apply(Action::Advance(form))
    }

    pub fn reject(&mut self) -> Result<Applied, EngineError> {
        self.apply(Action::Reject)
    }

    pub fn resolve_block<I, T>(&mut self, motivos: I, detalle: &str) -> Result<Applied, EngineError>
        where I: IntoIterator<Item = T>,
              T: Into<String>
    {
        self.apply(Action::ResolveBlock { motivos: motivos.into_iter().map(Into::into).collect(),
                                          detalle: detalle.to_string() })
    }

    pub fn go_back(&mut self) -> Result<Applied, EngineError> {
        self.apply(Action::GoBack)
    }

    pub fn stop(&mut self) -> Result<Applied, EngineError> {
        self.apply(Action::Stop)
    }

    /// Descarta la sesión actual (olvida su id) y crea una nueva en el nodo
    /// inicial. La sesión previa queda en el store.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        let previous = self.session.session_id;
        self.registry.forget(&self.procedure.id)?;
        let session = self.store.create(&self.procedure.id, &self.area_id, &self.procedure.start_node)?;
        self.registry.remember(&self.procedure.id, session.session_id)?;
        debug!("session reset pro={} old={} new={}", self.procedure.id, previous, session.session_id);
        self.session = session;
        self.init = SessionInit::Fresh;
        Ok(())
    }

    /// Persiste el estado actual y compone el artefacto desde la
    /// instantánea del store.
    pub fn export(&mut self) -> Result<ExportArtifact, EngineError> {
        self.persist(self.session.clone())?;
        self.export_snapshot()
    }

    /// Lee la instantánea del store sin volver a escribir la sesión.
    fn export_snapshot(&self) -> Result<ExportArtifact, EngineError> {
        let snapshot = self.store.export(self.session.session_id).map_err(|e| {
                                                                    error!("export failed id={}: {e}", self.session.session_id);
                                                                    e
                                                                })?;
        let artifact = ExportArtifact::new(&self.procedure, snapshot);
        debug!("session exported id={} file={}", self.session.session_id, artifact.filename);
        Ok(artifact)
    }

    fn apply(&mut self, action: Action) -> Result<Applied, EngineError> {
        let outcome = evaluate(&self.procedure, &self.session, &action, Utc::now()).map_err(|e| {
                          match e.as_rejection() {
                              Some(r) => warn!("{} rejected at {}: {r}", action.name(), self.session.current_node),
                              None => error!("{} failed at {}: {e}", action.name(), self.session.current_node),
                          }
                          e
                      })?;
        match outcome {
            Outcome::Unchanged => Ok(Applied::Unchanged),
            Outcome::Moved(next) => {
                self.persist(next)?;
                debug!("{} applied id={} node={} estado={}",
                       action.name(),
                       self.session.session_id,
                       self.session.current_node,
                       self.session.estado);
                Ok(Applied::Moved)
            }
            Outcome::Export(next) => {
                self.persist(next)?;
                Ok(Applied::Exported(self.export_snapshot()?))
            }
        }
    }

    fn persist(&mut self, mut candidate: Session) -> Result<(), EngineError> {
        let updated_at = self.store
                             .replace(candidate.session_id, &SessionUpdate::from(&candidate))
                             .map_err(|e| {
                                 error!("persist failed id={}: {e}", candidate.session_id);
                                 e
                             })?;
        candidate.updated_at = updated_at;
        self.session = candidate;
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    pub fn init(&self) -> SessionInit {
        self.init
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Devuelve store y registro (p. ej. para reanudar en otra corrida).
    pub fn into_parts(self) -> (S, R) {
        (self.store, self.registry)
    }

    /// Nodo presentado. Error de búsqueda si el grafo ya no lo contiene; la
    /// única salida es `reset`.
    pub fn current_node(&self) -> Result<&Node, EngineError> {
        self.procedure
            .node(&self.session.current_node)
            .ok_or_else(|| EngineError::NodeNotFound(self.session.current_node.clone()))
    }

    pub fn progress(&self) -> Progress {
        Progress::of(&self.procedure, &self.session)
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        timeline(&self.procedure, &self.session)
    }

    pub fn summary(&self) -> Summary<'_> {
        Summary::of(&self.procedure, &self.session)
    }
}
