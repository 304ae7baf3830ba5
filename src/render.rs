//! Presentación en texto plano del nodo actual, el recorrido y el resumen.
//! Los números que ve el usuario (checklist, opciones) son 1-based.
use sop_core::model::{is_checklist_exempt, InputSpec, NodeKind};
use sop_core::{Node, Procedure, Progress, Session, Summary, TimelineEntry};

pub const TITLE_MAX_CHARS: usize = 42;

/// Recorta títulos largos para la línea de tiempo.
pub fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        return title.to_string();
    }
    let mut out: String = title.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn header(procedure: &Procedure, session: &Session, progress: &Progress) -> String {
    let step = match progress.step {
        Some(step) => format!("Paso {step} / {}", progress.total),
        None => "—".to_string(),
    };
    format!("{}\n{step}  ·  {}%  ·  ID {}  ·  {}",
            procedure.title(),
            progress.percent,
            session.short_id(),
            session.estado)
}

pub fn node_view(procedure: &Procedure, session: &Session, node: &Node) -> String {
    let mut lines = vec![format!("[{}] {}", node.type_label(), node.titulo)];
    if !node.rol.is_empty() {
        lines.push(format!("Rol: {}", node.rol));
    }
    if let Some(desc) = node.descripcion.as_deref().filter(|d| !d.is_empty()) {
        lines.push(desc.to_string());
    }

    match &node.kind {
        NodeKind::Task(task) => {
            if !task.acciones.is_empty() {
                lines.push("Acciones:".into());
                lines.extend(task.acciones.iter().map(|a| format!("  - {a}")));
            }
            push_inputs(&mut lines, node.inputs(), session);
            if !task.checklist.is_empty() {
                lines.push("Checklist (--check N):".into());
                lines.extend(task.checklist.iter().enumerate().map(|(i, item)| {
                                                                   let tag = if is_checklist_exempt(item) { " (opcional)" } else { "" };
                                                                   format!("  {}. {item}{tag}", i + 1)
                                                               }));
            }
            if let Some(v) = &task.validacion {
                lines.push(format!("Validación: {v}"));
            }
            lines.push(format!("Siguiente: {}", task.next));
        }
        NodeKind::Decision(decision) => {
            push_inputs(&mut lines, node.inputs(), session);
            lines.push("Opciones (--option N):".into());
            lines.extend(decision.opciones.iter().enumerate().map(|(i, o)| format!("  {}. {} → {}", i + 1, o.label, o.next)));
            if let Some(help) = &decision.ayuda {
                lines.push(format!("Ayuda: {help}"));
            }
        }
        NodeKind::End(end) => {
            if let Some(msg) = &end.mensaje {
                lines.push(msg.clone());
            }
            lines.push(format!("Estado final: {}", end.final_status()));
            push_inputs(&mut lines, node.inputs(), session);
            lines.push("Use `advance` o `export` para descargar la trazabilidad.".into());
        }
    }

    if let Some(since) = session.block_ts {
        lines.push(format!("BLOQUEADO desde {}", since.to_rfc3339()));
        lines.push(format!("Motivos disponibles: {}", procedure.motivos_bloqueo.join(", ")));
    }
    lines.join("\n")
}

fn push_inputs(lines: &mut Vec<String>, specs: &[InputSpec], session: &Session) {
    if specs.is_empty() {
        return;
    }
    lines.push("Campos (--set key=valor):".into());
    for spec in specs {
        let marker = if spec.required { " *" } else { "" };
        let current = session.inputs.get(&spec.key).map(String::as_str).unwrap_or("");
        let hint = match (current.is_empty(), spec.placeholder.as_deref()) {
            (false, _) => format!(" = {current}"),
            (true, Some(p)) => format!(" ({p})"),
            (true, None) => String::new(),
        };
        lines.push(format!("  {}{marker} [{}]{hint}", spec.display_label(), spec.key));
    }
}

pub fn timeline_view(entries: &[TimelineEntry]) -> String {
    entries.iter()
           .enumerate()
           .map(|(idx, e)| {
               let marker = if e.is_current { ">" } else { " " };
               let blocked = if e.was_blocked { "  [Bloqueado]" } else { "" };
               format!("{marker} {} · {} · {}{blocked}", idx + 1, e.tipo, truncate_title(&e.titulo, TITLE_MAX_CHARS))
           })
           .collect::<Vec<_>>()
           .join("\n")
}

pub fn summary_view(summary: &Summary<'_>) -> String {
    let mut lines = vec![format!("{} · {}", summary.proceso, summary.estado)];
    if let Some(status) = summary.estado_final {
        lines.push(format!("Estado final: {status}"));
    }

    lines.push("Campos:".into());
    if summary.inputs.is_empty() {
        lines.push("  (sin datos)".into());
    }
    lines.extend(summary.inputs.iter().map(|(k, v)| format!("  {k}: {v}")));

    lines.push("Decisiones:".into());
    if summary.decisiones.is_empty() {
        lines.push("  (sin decisiones)".into());
    }
    lines.extend(summary.decisiones
                        .iter()
                        .map(|d| format!("  {}  {}  → {}", d.ts.to_rfc3339(), d.titulo, d.seleccion)));

    lines.push("Bloqueos:".into());
    if summary.bloqueos.is_empty() {
        lines.push("  (sin bloqueos)".into());
    }
    lines.extend(summary.bloqueos.iter().map(|b| {
                                            format!("  {}  {}  {}  {}",
                                                    b.ts_inicio.to_rfc3339(),
                                                    b.titulo,
                                                    b.motivos.join(", "),
                                                    b.detalle)
                                        }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn long_titles_are_cut_with_ellipsis() {
        assert_eq!(truncate_title("Corto", 42), "Corto");
        let long = "Á".repeat(50);
        let cut = truncate_title(&long, 42);
        assert_eq!(cut.chars().count(), 42);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn task_view_lists_fields_and_checklist() {
        let p = Procedure::from_json("P1",
                                     json!({"nombre": "Prueba", "flow_order": ["A", "END"]}),
                                     json!({
                                         "A": {"type": "task", "titulo": "Revisar", "rol": "Analista",
                                               "inputs": [{"key": "resp", "label": "Responsable", "required": true, "placeholder": "Nombre"}],
                                               "checklist": ["Hecho", "Fotos (si aplica)"], "next": "END"},
                                         "END": {"type": "end", "titulo": "Fin"}
                                     }))
            .unwrap();
        let session = Session::new("P1", "", "A", chrono_now());
        let view = node_view(&p, &session, p.node("A").unwrap());
        assert!(view.contains("[Tarea] Revisar"));
        assert!(view.contains("Responsable * [resp] (Nombre)"));
        assert!(view.contains("2. Fotos (si aplica) (opcional)"));
        assert!(!view.contains("BLOQUEADO"));

        let head = header(&p, &session, &Progress::of(&p, &session));
        assert!(head.contains("Paso 1 / 2"));
        assert!(head.contains("50%"));
    }

    #[test]
    fn empty_summary_uses_placeholders() {
        let p = Procedure::from_json("P1", json!({}), json!({"END": {"type": "end", "titulo": "Fin"}})).unwrap();
        let session = Session::new("P1", "", "END", chrono_now());
        let text = summary_view(&Summary::of(&p, &session));
        assert!(text.contains("(sin datos)"));
        assert!(text.contains("(sin decisiones)"));
        assert!(text.contains("(sin bloqueos)"));
        assert!(text.contains("Estado final: FINALIZADO"));
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
