//! Nodos del grafo de un procedimiento.
//!
//! El JSON de origen (`nodos.json`) distingue el tipo de nodo con el campo
//! `type` (`"task" | "decision" | "end"`). Aquí se modela como un enum
//! etiquetado (`NodeKind`) donde cada variante sólo transporta los campos que
//! le corresponden, de modo que el motor despacha con `match` exhaustivo.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::{CHECKLIST_EXEMPT_MARKER, DEFAULT_FINAL_STATUS};

/// Grafo inmutable id → nodo, en el orden del documento de origen.
pub type NodeGraph = IndexMap<String, Node>;

/// Especificación de un campo de texto a completar en un nodo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl InputSpec {
    /// Etiqueta a mostrar en mensajes de validación (cae a la key si la
    /// etiqueta viene vacía).
    pub fn display_label(&self) -> &str {
        let label = self.label.trim();
        if label.is_empty() { self.key.as_str() } else { label }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub label: String,
    pub next: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(default)]
    pub acciones: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub checklist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validacion: Option<String>,
    pub next: String,
}

impl TaskNode {
    /// Índices de ítems de checklist que deben marcarse para avanzar.
    pub fn required_checklist(&self) -> impl Iterator<Item = usize> + '_ {
        self.checklist
            .iter()
            .enumerate()
            .filter(|(_, label)| !is_checklist_exempt(label))
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNode {
    #[serde(default)]
    pub opciones: Vec<DecisionOption>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Texto de ayuda mostrado bajo las opciones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ayuda: Option<String>,
}

impl DecisionNode {
    /// Busca una opción por su etiqueta (sin distinguir mayúsculas).
    pub fn option_index(&self, label: &str) -> Option<usize> {
        let wanted = label.trim().to_lowercase();
        self.opciones.iter().position(|o| o.label.trim().to_lowercase() == wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado_final: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
}

impl EndNode {
    pub fn final_status(&self) -> &str {
        self.estado_final.as_deref().unwrap_or(DEFAULT_FINAL_STATUS)
    }
}

/// Variante del nodo según su campo `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Task(TaskNode),
    Decision(DecisionNode),
    End(EndNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Se completa desde la key del grafo si el documento lo omite.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub rol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Campos de texto visibles del nodo (task, decision o end).
    pub fn inputs(&self) -> &[InputSpec] {
        match &self.kind {
            NodeKind::Task(t) => &t.inputs,
            NodeKind::Decision(d) => &d.inputs,
            NodeKind::End(e) => &e.inputs,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End(_))
    }

    /// Etiqueta del campo `type` en el documento de origen.
    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            NodeKind::Task(_) => "task",
            NodeKind::Decision(_) => "decision",
            NodeKind::End(_) => "end",
        }
    }

    /// Etiqueta legible para la línea de tiempo.
    pub fn type_label(&self) -> &'static str {
        match self.kind {
            NodeKind::Task(_) => "Tarea",
            NodeKind::Decision(_) => "Decisión",
            NodeKind::End(_) => "Fin",
        }
    }

    /// Ids de nodos sucesores declarados (task `next` u opciones de decisión).
    pub fn successors(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Task(t) => vec![t.next.as_str()],
            NodeKind::Decision(d) => d.opciones.iter().map(|o| o.next.as_str()).collect(),
            NodeKind::End(_) => Vec::new(),
        }
    }
}

/// Un ítem de checklist queda exento si su etiqueta contiene "si aplica".
pub fn is_checklist_exempt(label: &str) -> bool {
    label.to_lowercase().contains(CHECKLIST_EXEMPT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_node_deserializes_from_tagged_json() {
        let node: Node = serde_json::from_value(json!({
            "type": "task",
            "titulo": "Definir alcance",
            "rol": "Planificador",
            "acciones": ["Revisar inventario"],
            "inputs": [{"key": "responsable", "label": "Responsable", "required": true}],
            "checklist": ["Listado generado", "Fotos adjuntas (si aplica)"],
            "validacion": "¿Se definió el alcance?",
            "next": "S1"
        })).expect("task node");

        assert_eq!(node.type_tag(), "task");
        assert_eq!(node.inputs().len(), 1);
        assert!(node.inputs()[0].required);
        match &node.kind {
            NodeKind::Task(t) => {
                assert_eq!(t.next, "S1");
                assert_eq!(t.required_checklist().collect::<Vec<_>>(), vec![0]);
            }
            other => panic!("se esperaba task, llegó {other:?}"),
        }
    }

    #[test]
    fn decision_and_end_nodes_carry_only_their_fields() {
        let dec: Node = serde_json::from_value(json!({
            "type": "decision",
            "titulo": "¿Material reutilizable?",
            "opciones": [{"label": "Sí", "next": "A"}, {"label": "No", "next": "B"}],
            "ayuda": "Consulte al área usuaria"
        })).expect("decision node");
        assert_eq!(dec.successors(), vec!["A", "B"]);
        assert!(dec.inputs().is_empty());

        let end: Node = serde_json::from_value(json!({"type": "end", "titulo": "Fin", "mensaje": "Listo"})).expect("end node");
        assert!(end.is_end());
        match &end.kind {
            NodeKind::End(e) => assert_eq!(e.final_status(), "FINALIZADO"),
            other => panic!("se esperaba end, llegó {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let res = serde_json::from_value::<Node>(json!({"type": "gateway", "titulo": "x"}));
        assert!(res.is_err());
    }

    #[test]
    fn exemption_marker_is_case_insensitive() {
        assert!(is_checklist_exempt("Adjuntar acta (Si Aplica)"));
        assert!(is_checklist_exempt("si aplica: registrar lote"));
        assert!(!is_checklist_exempt("Registrar baja"));
    }

    #[test]
    fn option_lookup_by_label_ignores_case() {
        let dec = DecisionNode { opciones: vec![DecisionOption { label: "Reutilizar".into(), next: "R".into() },
                                                DecisionOption { label: "Dar de baja".into(), next: "B".into() }],
                                 inputs: vec![],
                                 ayuda: None };
        assert_eq!(dec.option_index("dar de baja"), Some(1));
        assert_eq!(dec.option_index("vender"), None);
    }
}
