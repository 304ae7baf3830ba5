//! Evaluación pura de transiciones.
//!
//! `evaluate` recibe el procedimiento, la sesión actual, la acción del
//! usuario (con una instantánea estructurada del formulario) y el instante
//! `now`; devuelve la sesión resultante o un rechazo de validación. Nunca
//! muta la sesión de entrada: si hay rechazo, no hubo cambio alguno.
//!
//! Orden de validación de `Advance`:
//! 1. Campos visibles del nodo (cualquier tipo); el primer requerido vacío
//!    aborta con su etiqueta.
//! 2. Sólo task: checklist completo (excepto ítems "si aplica").
//! 3. Sólo decision: exactamente una opción válida seleccionada.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::json;

use crate::constants::CATCH_ALL_REASON;
use crate::errors::{ActionRejected, EngineError};
use crate::event::LogKind;
use crate::model::{BlockRecord, DecisionNode, DecisionRecord, InputSpec, Node, NodeKind, Session, SessionStatus, TaskNode};
use crate::procedure::Procedure;

/// Instantánea del formulario al momento de la acción, desacoplada de cómo
/// se recolectó.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    /// Valores de campos visibles por key. Un campo ausente conserva el
    /// valor ya guardado en la sesión (el formulario se precarga con él).
    pub values: IndexMap<String, String>,
    /// Índices de ítems de checklist marcados.
    pub checked: BTreeSet<usize>,
    /// Índice de la opción elegida en un nodo decision.
    pub selected: Option<usize>,
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn check(mut self, index: usize) -> Self {
        self.checked.insert(index);
        self
    }

    pub fn check_all(mut self, count: usize) -> Self {
        self.checked.extend(0..count);
        self
    }

    pub fn select(mut self, index: usize) -> Self {
        self.selected = Some(index);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Advance(FormSnapshot),
    Reject,
    ResolveBlock { motivos: Vec<String>, detalle: String },
    GoBack,
    Stop,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Advance(_) => "advance",
            Action::Reject => "reject",
            Action::ResolveBlock { .. } => "resolve_block",
            Action::GoBack => "go_back",
            Action::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nueva sesión a persistir.
    Moved(Session),
    /// Avance sobre un nodo end: persistir (inputs incluidos) y exportar.
    Export(Session),
    /// Acción idempotente sin efecto (p. ej. rechazar estando bloqueado).
    Unchanged,
}

pub fn evaluate(procedure: &Procedure, session: &Session, action: &Action, now: DateTime<Utc>) -> Result<Outcome, EngineError> {
    let node = procedure.node(&session.current_node)
                        .ok_or_else(|| EngineError::NodeNotFound(session.current_node.clone()))?;
    let outcome = match action {
        Action::Advance(form) => advance(session, node, form, now),
        Action::Reject => reject(session, node, now),
        Action::ResolveBlock { motivos, detalle } => resolve_block(procedure, session, node, motivos, detalle, now),
        Action::GoBack => go_back(session, now),
        Action::Stop => stop(procedure, session, node, now),
    }?;
    Ok(outcome)
}

fn advance(session: &Session, node: &Node, form: &FormSnapshot, now: DateTime<Utc>) -> Result<Outcome, ActionRejected> {
    if session.is_blocked() {
        return Err(ActionRejected::Blocked);
    }
    let collected = collect_inputs(session, node.inputs(), form)?;

    match &node.kind {
        NodeKind::End(_) => {
            let mut next = session.clone();
            next.inputs.extend(collected);
            Ok(Outcome::Export(next))
        }
        NodeKind::Task(task) => {
            check_checklist(task, &form.checked)?;
            let mut next = session.clone();
            next.inputs.extend(collected);
            next.log(LogKind::Avanza, json!({ "next": task.next }), now);
            move_forward(&mut next, &task.next);
            Ok(Outcome::Moved(next))
        }
        NodeKind::Decision(decision) => {
            let (label, target) = selected_option(decision, form.selected)?;
            let mut next = session.clone();
            next.inputs.extend(collected);
            next.decisiones.push(DecisionRecord { ts: now,
                                                  nodo: node.id.clone(),
                                                  titulo: node.titulo.clone(),
                                                  seleccion: label.to_string(),
                                                  next: target.to_string() });
            next.log(LogKind::Decision, json!({ "seleccion": label, "next": target }), now);
            move_forward(&mut next, target);
            Ok(Outcome::Moved(next))
        }
    }
}

fn reject(session: &Session, node: &Node, now: DateTime<Utc>) -> Result<Outcome, ActionRejected> {
    if node.is_end() {
        return Err(ActionRejected::Terminal);
    }
    if session.is_blocked() {
        return Ok(Outcome::Unchanged);
    }
    let mut next = session.clone();
    next.block_ts = Some(now);
    next.estado = SessionStatus::Bloqueado;
    next.log(LogKind::BloqueadoInicio, json!({}), now);
    Ok(Outcome::Moved(next))
}

fn resolve_block(procedure: &Procedure,
                 session: &Session,
                 node: &Node,
                 motivos: &[String],
                 detalle: &str,
                 now: DateTime<Utc>)
                 -> Result<Outcome, ActionRejected> {
    let started = session.block_ts.ok_or(ActionRejected::NotBlocked)?;

    let mut reasons: Vec<String> = Vec::with_capacity(motivos.len());
    for m in motivos.iter().map(|m| m.trim()).filter(|m| !m.is_empty()) {
        if !procedure.is_known_reason(m) {
            return Err(ActionRejected::UnknownBlockReason(m.to_string()));
        }
        if !reasons.iter().any(|r| r == m) {
            reasons.push(m.to_string());
        }
    }
    if reasons.is_empty() {
        return Err(ActionRejected::NoBlockReason);
    }
    let detalle = detalle.trim();
    if detalle.is_empty() && reasons.iter().any(|r| r == CATCH_ALL_REASON) {
        return Err(ActionRejected::MissingBlockDetail(CATCH_ALL_REASON.to_string()));
    }

    let mut next = session.clone();
    next.bloqueos.push(BlockRecord { ts_inicio: started,
                                     ts_fin: now,
                                     nodo: node.id.clone(),
                                     titulo: node.titulo.clone(),
                                     motivos: reasons.clone(),
                                     detalle: detalle.to_string() });
    next.log(LogKind::BloqueadoFin, json!({ "motivos": reasons, "detalle": detalle }), now);
    next.block_ts = None;
    next.estado = SessionStatus::EnCurso;
    next.log(LogKind::RehacerPaso, json!({}), now);
    Ok(Outcome::Moved(next))
}

/// Válido también desde un nodo final; `estado` no cambia.
fn go_back(session: &Session, now: DateTime<Utc>) -> Result<Outcome, ActionRejected> {
    if session.is_blocked() {
        return Err(ActionRejected::Blocked);
    }
    let mut next = session.clone();
    let prev = next.history.pop().ok_or(ActionRejected::NoHistory)?;
    next.log(LogKind::Volver, json!({ "to": prev }), now);
    next.current_node = prev;
    Ok(Outcome::Moved(next))
}

fn stop(procedure: &Procedure, session: &Session, node: &Node, now: DateTime<Utc>) -> Result<Outcome, ActionRejected> {
    let stop_node = procedure.stop_node.as_deref().ok_or(ActionRejected::StopUnavailable)?;
    if node.is_end() {
        return Err(ActionRejected::Terminal);
    }
    if session.is_blocked() {
        return Err(ActionRejected::Blocked);
    }
    let mut next = session.clone();
    next.log(LogKind::Stop, json!({ "nodo": node.id }), now);
    move_forward(&mut next, stop_node);
    next.estado = SessionStatus::Detenido;
    Ok(Outcome::Moved(next))
}

fn move_forward(session: &mut Session, target: &str) {
    let left = std::mem::replace(&mut session.current_node, target.to_string());
    session.history.push(left);
}

/// Recolecta (key, valor recortado) de cada campo visible y valida los
/// requeridos. Devuelve todos los valores, incluso vacíos, como hace el
/// formulario al enviar.
fn collect_inputs(session: &Session, specs: &[InputSpec], form: &FormSnapshot) -> Result<Vec<(String, String)>, ActionRejected> {
    let mut collected = Vec::with_capacity(specs.len());
    let mut missing: Option<&InputSpec> = None;
    for spec in specs {
        let value = form.values
                        .get(&spec.key)
                        .or_else(|| session.inputs.get(&spec.key))
                        .map(|v| v.trim().to_string())
                        .unwrap_or_default();
        if spec.required && value.is_empty() && missing.is_none() {
            missing = Some(spec);
        }
        collected.push((spec.key.clone(), value));
    }
    match missing {
        Some(spec) => Err(ActionRejected::MissingField { key: spec.key.clone(),
                                                         label: spec.display_label().to_string() }),
        None => Ok(collected),
    }
}

fn check_checklist(task: &TaskNode, checked: &BTreeSet<usize>) -> Result<(), ActionRejected> {
    let pending: Vec<usize> = task.required_checklist().filter(|i| !checked.contains(i)).collect();
    if pending.is_empty() {
        Ok(())
    } else {
        Err(ActionRejected::ChecklistIncomplete { pending })
    }
}

fn selected_option(decision: &DecisionNode, selected: Option<usize>) -> Result<(&str, &str), ActionRejected> {
    let index = selected.ok_or(ActionRejected::NoOptionSelected)?;
    let option = decision.opciones.get(index).ok_or(ActionRejected::UnknownOption(index))?;
    Ok((option.label.as_str(), option.next.as_str()))
}
