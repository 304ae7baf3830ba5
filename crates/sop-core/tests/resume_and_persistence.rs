mod common;

use common::{procedure, scope_form, FlakyStore};
use serde_json::json;
use sop_core::{Applied, EngineError, FormSnapshot, InMemorySessionRegistry, InMemorySessionStore, Procedure, SessionController, SessionInit, SessionRegistry, SessionStatus, SessionStore, StoreError};
use uuid::Uuid;

#[test]
fn remembered_session_is_resumed_verbatim() {
    let mut ctl = SessionController::start(procedure(), "logistica", InMemorySessionStore::new(), InMemorySessionRegistry::new()).unwrap();
    ctl.advance(scope_form()).unwrap();
    let before = ctl.session().clone();
    let (store, registry) = ctl.into_parts();

    let ctl = SessionController::start(procedure(), "logistica", store, registry).unwrap();
    assert_eq!(ctl.init(), SessionInit::Resumed);
    let s = ctl.session();
    assert_eq!(s.session_id, before.session_id);
    assert_eq!(s.current_node, "S1_decision");
    assert_eq!(s.history, before.history);
    assert_eq!(s.inputs, before.inputs);
    assert_eq!(s.logs.len(), 1);
}

#[test]
fn resumed_blocked_session_stays_blocked() {
    let mut ctl = SessionController::start(procedure(), "", InMemorySessionStore::new(), InMemorySessionRegistry::new()).unwrap();
    ctl.reject().unwrap();
    let opened_at = ctl.session().logs[0].ts;
    let (store, registry) = ctl.into_parts();

    let mut ctl = SessionController::start(procedure(), "", store, registry).unwrap();
    assert_eq!(ctl.session().estado, SessionStatus::Bloqueado);
    assert_eq!(ctl.session().block_ts, Some(opened_at));
    assert!(ctl.advance(scope_form()).is_err());

    ctl.resolve_block(["Sistema no disponible"], "").unwrap();
    let b = &ctl.session().bloqueos[0];
    assert_eq!(b.ts_inicio, opened_at);
    assert!(b.ts_fin >= opened_at);
}

#[test]
fn remembered_id_of_other_procedure_starts_fresh() {
    let mut store = InMemorySessionStore::new();
    let foreign = store.create("PRO999", "", "X").unwrap();
    let mut registry = InMemorySessionRegistry::new();
    registry.remember("PRO141", foreign.session_id).unwrap();

    let ctl = SessionController::start(procedure(), "", store, registry).unwrap();
    assert_eq!(ctl.init(), SessionInit::Fresh);
    assert_ne!(ctl.session().session_id, foreign.session_id);
    assert_eq!(ctl.registry().last("PRO141"), Some(ctl.session().session_id));
}

#[test]
fn missing_or_unreadable_remembered_session_starts_fresh() {
    let mut registry = InMemorySessionRegistry::new();
    registry.remember("PRO141", Uuid::new_v4()).unwrap();
    let ctl = SessionController::start(procedure(), "", InMemorySessionStore::new(), registry).unwrap();
    assert_eq!(ctl.init(), SessionInit::Fresh);

    let (store, registry) = ctl.into_parts();
    let flaky = FlakyStore { inner: store, ..FlakyStore::new() };
    flaky.fail_reads.set(true);
    let ctl = SessionController::start(procedure(), "", flaky, registry).unwrap();
    assert_eq!(ctl.init(), SessionInit::Fresh);
}

#[test]
fn failed_persist_leaves_state_untouched_and_can_be_retried() {
    let store = FlakyStore::new();
    let offline = store.fail_writes.clone();
    let mut ctl = SessionController::start(procedure(), "", store, InMemorySessionRegistry::new()).unwrap();
    let before = ctl.session().clone();

    offline.set(true);
    let err = ctl.advance(scope_form()).unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
    assert_eq!(ctl.session(), &before);

    offline.set(false);
    assert_eq!(ctl.advance(scope_form()).unwrap(), Applied::Moved);
    assert_eq!(ctl.session().current_node, "S1_decision");
    assert_eq!(ctl.session().logs.len(), 1);
    let stored = ctl.store().get(before.session_id).unwrap().unwrap();
    assert_eq!(stored.current_node, "S1_decision");
    assert_eq!(stored.updated_at, ctl.session().updated_at);
}

#[test]
fn end_node_export_writes_the_session_once() {
    let store = FlakyStore::new();
    let replaces = store.replaces.clone();
    let mut ctl = SessionController::start(procedure(), "", store, InMemorySessionRegistry::new()).unwrap();
    ctl.advance(scope_form()).unwrap();
    ctl.advance(FormSnapshot::new().select(1)).unwrap();
    ctl.advance(FormSnapshot::new()).unwrap();
    assert_eq!(ctl.session().current_node, "END_OK");
    assert_eq!(replaces.get(), 3);

    let exported = match ctl.advance(FormSnapshot::new().value("observaciones", "ok")).unwrap() {
        Applied::Exported(artifact) => artifact,
        other => panic!("expected export, got {other:?}"),
    };
    assert_eq!(replaces.get(), 4);
    assert_eq!(exported.document.snapshot.session.updated_at, ctl.session().updated_at);
    assert_eq!(exported.document.snapshot.session.inputs.get("observaciones").map(String::as_str), Some("ok"));

    ctl.export().unwrap();
    assert_eq!(replaces.get(), 5);
}

#[test]
fn creation_failure_is_reported() {
    let store = FlakyStore::new();
    store.fail_writes.set(true);
    let err = SessionController::start(procedure(), "", store, InMemorySessionRegistry::new()).unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[test]
fn graph_change_surfaces_lookup_error_until_reset() {
    let mut ctl = SessionController::start(procedure(), "", InMemorySessionStore::new(), InMemorySessionRegistry::new()).unwrap();
    ctl.advance(scope_form()).unwrap();
    let (store, registry) = ctl.into_parts();

    let trimmed = Procedure::from_json("PRO141",
                                       json!({"flow_order": ["S0_alcance"]}),
                                       json!({
                                           "S0_alcance": {"type": "task", "titulo": "Alcance", "next": "END_OK"},
                                           "END_OK": {"type": "end", "titulo": "Fin"}
                                       }))
        .unwrap();
    let mut ctl = SessionController::start(trimmed, "", store, registry).unwrap();
    assert_eq!(ctl.init(), SessionInit::Resumed);
    assert!(matches!(ctl.current_node(), Err(EngineError::NodeNotFound(ref id)) if id == "S1_decision"));
    assert!(matches!(ctl.advance(FormSnapshot::new()), Err(EngineError::NodeNotFound(_))));

    ctl.reset().unwrap();
    assert_eq!(ctl.current_node().unwrap().id, "S0_alcance");
    assert!(ctl.session().logs.is_empty());
}
