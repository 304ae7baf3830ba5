//! Descriptor de procedimiento: grafo + parámetros que antes vivían
//! duplicados en cada variante (orden lineal, motivos de bloqueo, nodo de
//! inicio y nodo de STOP).
//!
//! Un `Procedure` sólo se construye validado: todo `next` apunta a un nodo
//! existente, el nodo inicial existe, el nodo de STOP (si hay) es `end` y
//! el grafo no tiene ciclos. Con eso, `current_node` de una sesión avanzada
//! por el motor siempre denota un nodo del grafo y nunca aparece en
//! `history`.
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;

use crate::constants::{CATCH_ALL_REASON, DEFAULT_STOP_NODE};
use crate::errors::GraphError;
use crate::hashing::hash_value;
use crate::model::{Node, NodeGraph, NodeKind};

/// Configuración de un procedimiento tal como aparece en `areas.json`
/// (`pros.<id>`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcedureConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub has_stop: bool,
    #[serde(default)]
    pub stop_node: Option<String>,
    #[serde(default)]
    pub start_node: Option<String>,
    #[serde(default)]
    pub flow_order: Vec<String>,
    #[serde(default)]
    pub motivos_bloqueo: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub id: String,
    pub nombre: String,
    pub descripcion: String,
    pub start_node: String,
    pub stop_node: Option<String>,
    /// Orden lineal usado sólo para el porcentaje de avance.
    pub flow_order: Vec<String>,
    pub motivos_bloqueo: Vec<String>,
    pub nodes: NodeGraph,
    pub definition_hash: String,
}

impl Procedure {
    /// Construye y valida el descriptor a partir de su configuración y del
    /// grafo crudo (`nodos.json`).
    pub fn from_parts(id: &str, config: ProcedureConfig, raw_nodes: IndexMap<String, Node>) -> Result<Self, GraphError> {
        let nodes = normalize_graph(raw_nodes)?;

        let start_node = config.start_node
                               .clone()
                               .or_else(|| config.flow_order.first().cloned())
                               .or_else(|| nodes.keys().next().cloned())
                               .ok_or(GraphError::EmptyGraph)?;
        let stop_node = match (config.stop_node, config.has_stop) {
            (Some(s), _) => Some(s),
            (None, true) => Some(DEFAULT_STOP_NODE.to_string()),
            (None, false) => None,
        };
        let motivos_bloqueo = if config.motivos_bloqueo.is_empty() {
            vec![CATCH_ALL_REASON.to_string()]
        } else {
            config.motivos_bloqueo
        };

        let definition_hash = hash_value(&json!({
            "nodes": nodes,
            "flow_order": config.flow_order,
            "motivos_bloqueo": motivos_bloqueo,
            "start_node": start_node,
            "stop_node": stop_node,
        }));

        let procedure = Self { id: config.id.unwrap_or_else(|| id.to_string()),
                               nombre: config.nombre,
                               descripcion: config.descripcion,
                               start_node,
                               stop_node,
                               flow_order: config.flow_order,
                               motivos_bloqueo,
                               nodes,
                               definition_hash };
        procedure.validate()?;
        Ok(procedure)
    }

    /// Atajo para construir desde valores JSON (tests y fixtures).
    pub fn from_json(id: &str, config: serde_json::Value, nodes: serde_json::Value) -> Result<Self, GraphError> {
        let config: ProcedureConfig = serde_json::from_value(config)?;
        let nodes: IndexMap<String, Node> = serde_json::from_value(nodes)?;
        Self::from_parts(id, config, nodes)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn is_known_reason(&self, reason: &str) -> bool {
        self.motivos_bloqueo.iter().any(|m| m == reason)
    }

    /// Título usado en la exportación: `"<id> – <nombre>"`.
    pub fn title(&self) -> String {
        if self.nombre.is_empty() {
            self.id.clone()
        } else {
            format!("{} – {}", self.id, self.nombre)
        }
    }

    fn validate(&self) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&self.start_node) {
            return Err(GraphError::MissingStartNode(self.start_node.clone()));
        }
        for (id, node) in &self.nodes {
            if let NodeKind::Decision(d) = &node.kind {
                if d.opciones.is_empty() {
                    return Err(GraphError::EmptyDecision(id.clone()));
                }
            }
            for next in node.successors() {
                if !self.nodes.contains_key(next) {
                    return Err(GraphError::DanglingEdge { from: id.clone(), to: next.to_string() });
                }
            }
        }
        if let Some(stop) = &self.stop_node {
            match self.nodes.get(stop) {
                None => return Err(GraphError::MissingStopNode(stop.clone())),
                Some(n) if !n.is_end() => return Err(GraphError::StopNodeNotEnd(stop.clone())),
                Some(_) => {}
            }
        }
        if let Some(path) = find_cycle(&self.nodes) {
            return Err(GraphError::Cycle { path });
        }
        for id in &self.flow_order {
            if !self.nodes.contains_key(id) {
                log::warn!("procedure {}: flow_order id '{}' not present in graph", self.id, id);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

/// DFS sobre todo el grafo (también nodos no alcanzables desde el inicio).
/// Devuelve el primer ciclo encontrado, cerrado con el nodo repetido.
fn find_cycle(nodes: &NodeGraph) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(nodes.len());
    let mut stack = Vec::new();
    nodes.keys()
         .find_map(|id| visit(id, nodes, &mut marks, &mut stack))
}

fn visit<'a>(id: &'a str, nodes: &'a NodeGraph, marks: &mut HashMap<&'a str, Mark>, stack: &mut Vec<&'a str>) -> Option<Vec<String>> {
    match marks.get(id) {
        Some(Mark::Done) => return None,
        Some(Mark::Open) => {
            let from = stack.iter().position(|s| *s == id).unwrap_or(0);
            let mut path: Vec<String> = stack[from..].iter().map(|s| s.to_string()).collect();
            path.push(id.to_string());
            return Some(path);
        }
        None => {}
    }
    marks.insert(id, Mark::Open);
    stack.push(id);
    if let Some(node) = nodes.get(id) {
        for next in node.successors() {
            if let Some(path) = visit(next, nodes, marks, stack) {
                return Some(path);
            }
        }
    }
    stack.pop();
    marks.insert(id, Mark::Done);
    None
}

/// Completa `id` desde la key cuando falta y rechaza ids contradictorios.
fn normalize_graph(raw: IndexMap<String, Node>) -> Result<NodeGraph, GraphError> {
    if raw.is_empty() {
        return Err(GraphError::EmptyGraph);
    }
    raw.into_iter()
       .map(|(key, mut node)| {
           if node.id.is_empty() {
               node.id = key.clone();
           } else if node.id != key {
               return Err(GraphError::IdMismatch { key, id: node.id });
           }
           Ok((key, node))
       })
       .collect()
}
