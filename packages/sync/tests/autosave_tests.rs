use instruct_editor::InstructionStore;
use instruct_model::{Assembly, Instruction, Note, Step};
use instruct_sync::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn seed() -> Instruction {
    let mut store = InstructionStore::new();
    store.update_instruction(|meta| meta.name = "Workbench".into());
    store.add(Assembly { id: "a1".into(), ..Default::default() });
    store.add(Step { id: "s1".into(), assembly_id: Some("a1".into()), ..Default::default() });
    store.add(Note { id: "n1".into(), text: "Sharp edges".into(), ..Default::default() });
    store.document().clone()
}

fn config(debounce_ms: u64) -> AutoSaveConfig {
    AutoSaveConfig { debounce_ms, enabled: true }
}

fn setup(backend: MemoryPersistence) -> (Arc<MemoryPersistence>, SharedStore) {
    let backend = Arc::new(backend.with_project("p1", seed()));
    let store = SharedStore::new(InstructionStore::with_document(seed()));
    (backend, store)
}

fn edit_note(store: &SharedStore, text: &str) {
    store.edit(|s| s.update::<Note>("n1", |n| n.text = text.into()));
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_saves_once() {
    let (backend, store) = setup(MemoryPersistence::new());
    let handle = AutoSaveScheduler::spawn(store.clone(), backend.clone(), "p1", config(1000));

    edit_note(&store, "Very sharp edges");
    sleep(Duration::from_millis(300)).await;
    store.edit(|s| s.add(Note { id: "n2".into(), text: "Wear gloves".into(), ..Default::default() }));
    sleep(Duration::from_millis(300)).await;
    store.edit(|s| s.update::<Assembly>("a1", |a| a.title = "Top".into()));

    // Last edit at 600ms; the timer restarts on every edit.
    sleep(Duration::from_millis(990)).await;
    assert_eq!(backend.save_count(), 0);

    sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.save_count(), 1);

    let call = &backend.save_calls()[0];
    assert_eq!(call.project_id, "p1");
    assert_eq!(call.changes.changed["notes"].len(), 2);
    assert_eq!(call.changes.changed["assemblies"].len(), 1);

    assert!(!store.read(|s| s.has_changes()));
    assert_eq!(backend.project("p1"), Some(store.read(|s| s.document().clone())));

    handle.shutdown().await;
    assert_eq!(backend.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_changes_and_retries_on_next_edit() {
    let (backend, store) = setup(MemoryPersistence::new());
    backend.fail_next_saves(1);
    let handle = AutoSaveScheduler::spawn(store.clone(), backend.clone(), "p1", config(1000));

    edit_note(&store, "first");
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(backend.save_count(), 1);
    assert!(store.read(|s| s.has_changes()));
    assert_eq!(backend.project("p1").map(|doc| doc.notes["n1"].text.clone()), Some("Sharp edges".into()));

    store.edit(|s| s.update::<Step>("s1", |step| step.title = "Clamp".into()));
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(backend.save_count(), 2);
    assert!(!store.read(|s| s.has_changes()));

    // The retry carries everything since the last successful save.
    let retry = &backend.save_calls()[1];
    assert!(retry.changes.changed.contains_key("notes"));
    assert!(retry.changes.changed.contains_key("steps"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_edit_once() {
    let (backend, store) = setup(MemoryPersistence::new());
    let handle = AutoSaveScheduler::spawn(store.clone(), backend.clone(), "p1", config(1000));

    edit_note(&store, "last words");
    handle.shutdown().await;

    assert_eq!(backend.save_count(), 1);
    assert!(!store.read(|s| s.has_changes()));
    assert_eq!(
        backend.project("p1").map(|doc| doc.notes["n1"].text.clone()),
        Some("last words".into())
    );
}

#[tokio::test(start_paused = true)]
async fn test_trigger_during_save_is_dropped() {
    let (backend, store) =
        setup(MemoryPersistence::new().with_latency(Duration::from_millis(500)));
    let handle = AutoSaveScheduler::spawn(store.clone(), backend.clone(), "p1", config(1000));

    edit_note(&store, "one");
    // Save starts at 1000ms and answers at 1500ms.
    sleep(Duration::from_millis(1100)).await;
    assert!(handle.is_saving());
    assert_eq!(handle.save_now().await, SaveOutcome::SkippedInFlight);

    edit_note(&store, "two");
    sleep(Duration::from_millis(2000)).await;

    assert_eq!(backend.save_count(), 1);
    assert!(!handle.is_saving());
    // The mid-save edit is still tracked.
    assert!(store.read(|s| s.tracker().kind(instruct_model::EntityKind::Note).changed.contains("n1")));

    handle.shutdown().await;
    assert_eq!(backend.save_count(), 2);
    assert!(!store.read(|s| s.has_changes()));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_autosave_only_saves_on_request() {
    let (backend, store) = setup(MemoryPersistence::new());
    let disabled = AutoSaveConfig { debounce_ms: 100, enabled: false };
    let handle = AutoSaveScheduler::spawn(store.clone(), backend.clone(), "p1", disabled);

    edit_note(&store, "manual");
    sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.save_count(), 0);

    assert_eq!(handle.save_now().await, SaveOutcome::Saved);
    assert_eq!(handle.save_now().await, SaveOutcome::NothingToSave);

    handle.shutdown().await;
    assert_eq!(backend.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_editing_session_round_trip() {
    let backend = Arc::new(MemoryPersistence::new().with_project("p1", seed()));
    let mut session = EditingSession::open(backend.clone(), "p1", &SessionConfig::default())
        .await
        .unwrap();

    assert!(session.apply(|s| s.update::<Note>("n1", |n| n.text = "draft".into())));
    assert!(session.apply(|s| s.update::<Note>("n1", |n| n.text = "final".into())));
    assert!(!session.apply(|s| s.update::<Note>("ghost", |n| n.text = "x".into())));
    assert_eq!(session.history().undo_levels(), 2);

    assert!(session.undo());
    assert_eq!(session.store().read(|s| s.document().notes["n1"].text.clone()), "draft");

    session.close().await;

    let saved = backend.project("p1").unwrap();
    assert_eq!(saved.notes["n1"].text, "draft");
    assert_eq!(backend.save_count(), 1);
}

#[tokio::test]
async fn test_open_missing_project_fails() {
    let backend = Arc::new(MemoryPersistence::new());
    let result = EditingSession::open(backend, "nope", &SessionConfig::default()).await;
    assert!(matches!(result, Err(PersistenceError::NotFound(_))));
}
