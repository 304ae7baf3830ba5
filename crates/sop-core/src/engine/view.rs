//! Vistas de sólo lectura sobre la sesión: avance, recorrido y resumen.
use serde::Serialize;

use crate::model::{BlockRecord, DecisionRecord, NodeKind, Session, SessionStatus};
use crate::procedure::Procedure;

/// Avance informativo según `flow_order`. No participa en transiciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Posición 1-based en el orden lineal; `None` en ramas alternativas.
    pub step: Option<usize>,
    pub total: usize,
    pub percent: u8,
}

impl Progress {
    pub fn of(procedure: &Procedure, session: &Session) -> Self {
        let total = procedure.flow_order.len();
        let step = procedure.flow_order
                            .iter()
                            .position(|id| *id == session.current_node)
                            .map(|i| i + 1);
        let percent = match step {
            Some(s) if total > 0 => ((s as f64 / total as f64) * 100.0).round() as u8,
            _ => 0,
        };
        Self { step, total, percent }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub node_id: String,
    pub titulo: String,
    pub tipo: &'static str,
    pub is_current: bool,
    pub was_blocked: bool,
}

/// Recorrido `history + [current_node]`. Los ids ausentes del grafo se
/// omiten.
pub fn timeline(procedure: &Procedure, session: &Session) -> Vec<TimelineEntry> {
    session.history
           .iter()
           .chain(std::iter::once(&session.current_node))
           .enumerate()
           .filter_map(|(idx, id)| {
               let node = procedure.node(id)?;
               Some(TimelineEntry { node_id: id.clone(),
                                    titulo: node.titulo.clone(),
                                    tipo: node.type_label(),
                                    is_current: idx == session.history.len(),
                                    was_blocked: session.bloqueos.iter().any(|b| b.nodo == *id) })
           })
           .collect()
}

/// Resumen de cierre: campos registrados, decisiones y bloqueos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary<'a> {
    pub proceso: String,
    pub estado: SessionStatus,
    pub estado_final: Option<&'a str>,
    pub inputs: Vec<(&'a str, &'a str)>,
    pub decisiones: &'a [DecisionRecord],
    pub bloqueos: &'a [BlockRecord],
}

impl<'a> Summary<'a> {
    pub fn of(procedure: &'a Procedure, session: &'a Session) -> Self {
        let estado_final = match procedure.node(&session.current_node).map(|n| &n.kind) {
            Some(NodeKind::End(end)) => Some(end.final_status()),
            _ => None,
        };
        Self { proceso: procedure.title(),
               estado: session.estado,
               estado_final,
               inputs: session.inputs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
               decisiones: &session.decisiones,
               bloqueos: &session.bloqueos }
    }
}
