//! Recorrido completo del controlador sobre el store SQLite.


use serde_json::json;
use sop_core::{Applied, FormSnapshot, JsonFileRegistry, Procedure, SessionController, SessionInit, SessionStatus};
use test_support::TempDb;

fn procedure() -> Procedure {
    Procedure::from_json("PRO7",
                         json!({"nombre": "Inventario cíclico", "has_stop": true,
                                "flow_order": ["S0", "S1", "END_OK"],
                                "motivos_bloqueo": ["Falta información", "Otro"]}),
                         json!({
                             "S0": {"type": "task", "titulo": "Contar", "inputs": [{"key": "conteo", "label": "Conteo", "required": true}],
                                    "checklist": ["Ubicación rotulada"], "next": "S1"},
                             "S1": {"type": "decision", "titulo": "¿Diferencias?",
                                    "opciones": [{"label": "Sí", "next": "S2"}, {"label": "No", "next": "END_OK"}]},
                             "S2": {"type": "task", "titulo": "Ajustar", "next": "END_OK"},
                             "END_OK": {"type": "end", "titulo": "Fin"},
                             "END_STOP": {"type": "end", "titulo": "Detenido"}
                         }))
        .unwrap()
}

#[test]
fn blocked_run_resumes_from_disk_and_exports() {
    let db = TempDb::new();
    let registry_path = db.dir.path().join("registry.json");

    let session_id = {
        let mut ctl = SessionController::start(procedure(), "inventarios", db.store(), JsonFileRegistry::open(&registry_path).unwrap()).unwrap();
        assert_eq!(ctl.init(), SessionInit::Fresh);
        ctl.advance(FormSnapshot::new().value("conteo", "42").check(0)).unwrap();
        ctl.reject().unwrap();
        ctl.session().session_id
    };

    let mut ctl = SessionController::start(procedure(), "inventarios", db.store(), JsonFileRegistry::open(&registry_path).unwrap()).unwrap();
    assert_eq!(ctl.init(), SessionInit::Resumed);
    assert_eq!(ctl.session().session_id, session_id);
    assert_eq!(ctl.session().estado, SessionStatus::Bloqueado);
    assert!(ctl.session().is_blocked());

    ctl.resolve_block(["Otro"], "Conteo repetido").unwrap();
    ctl.advance(FormSnapshot::new().select(1)).unwrap();
    let artifact = match ctl.advance(FormSnapshot::new()).unwrap() {
        Applied::Exported(a) => a,
        other => panic!("expected export, got {other:?}"),
    };
    let doc: serde_json::Value = serde_json::from_str(&artifact.to_pretty_json().unwrap()).unwrap();
    assert_eq!(doc["session_id"], session_id.to_string());
    assert_eq!(doc["area_id"], "inventarios");
    assert_eq!(doc["inputs"]["conteo"], "42");
    assert_eq!(doc["bloqueos"][0]["nodo"], "S1");
    assert_eq!(doc["decisiones"][0]["seleccion"], "No");
    assert_eq!(doc["current_node"], "END_OK");
}

#[test]
fn stop_and_reset_persist() {
    let db = TempDb::new();
    let registry_path = db.dir.path().join("registry.json");
    let mut ctl = SessionController::start(procedure(), "", db.store(), JsonFileRegistry::open(&registry_path).unwrap()).unwrap();
    ctl.stop().unwrap();
    let stopped = ctl.session().session_id;
    ctl.reset().unwrap();
    let fresh = ctl.session().session_id;
    drop(ctl);

    let ctl = SessionController::start(procedure(), "", db.store(), JsonFileRegistry::open(&registry_path).unwrap()).unwrap();
    assert_eq!(ctl.session().session_id, fresh);
    assert_ne!(fresh, stopped);

    use sop_core::SessionStore;
    let old = db.store().get(stopped).unwrap().unwrap();
    assert_eq!(old.current_node, "END_STOP");
    assert_eq!(old.estado, SessionStatus::Detenido);
}
