use cs_core::model::{MediaEntry, MediaKind};
use cs_storage::{
    ActionKind, DEFAULT_PROJECT_ID, EngineOptions, MemorySessionStore, OrderUpdate,
    SaveContentRequest, SessionStore, StorageEngine,
};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_storage_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!(
        "clipstash-undo-{label}-{}-{nanos}",
        std::process::id()
    ));
    path
}

fn open_engine(dir: &PathBuf) -> StorageEngine {
    let options = EngineOptions {
        maintenance: false,
        ..EngineOptions::default()
    };
    StorageEngine::open_with_options(dir, options, Box::new(MemorySessionStore::default()))
        .expect("engine should open")
}

fn save_text(engine: &StorageEngine, text: &str) -> cs_core::model::ContentItem {
    engine
        .save_content(
            None,
            SaveContentRequest {
                text: text.to_string(),
                ..SaveContentRequest::default()
            },
        )
        .expect("content item should save")
}

#[test]
fn undo_of_create_deletes_and_redo_recreates() {
    let dir = temp_storage_dir("create");
    let engine = open_engine(&dir);

    let item = save_text(&engine, "captured");
    engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Create,
            &item.key,
            None,
            Some(item.clone()),
        )
        .expect("action should record");

    let undone = engine.undo(DEFAULT_PROJECT_ID).expect("undo should apply");
    assert_eq!(undone, Some(ActionKind::Create));
    assert!(
        engine
            .get_content(&item.key)
            .expect("lookup should succeed")
            .is_none()
    );

    let redone = engine.redo(DEFAULT_PROJECT_ID).expect("redo should apply");
    assert_eq!(redone, Some(ActionKind::Create));
    let restored = engine
        .get_content(&item.key)
        .expect("lookup should succeed")
        .expect("item must be recreated");
    assert_eq!(restored, item, "snapshots restore verbatim");
}

#[test]
fn undo_redo_of_update_swaps_snapshots() {
    let dir = temp_storage_dir("update");
    let engine = open_engine(&dir);

    let before = save_text(&engine, "draft");
    let after = engine
        .save_content(
            Some(&before.key),
            SaveContentRequest {
                text: "final".to_string(),
                ..SaveContentRequest::default()
            },
        )
        .expect("edit should save");
    engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Update,
            &before.key,
            Some(before.clone()),
            Some(after.clone()),
        )
        .expect("action should record");

    engine.undo(DEFAULT_PROJECT_ID).expect("undo should apply");
    assert_eq!(
        engine
            .get_content(&before.key)
            .expect("lookup should succeed")
            .expect("item must exist"),
        before
    );

    engine.redo(DEFAULT_PROJECT_ID).expect("redo should apply");
    assert_eq!(
        engine
            .get_content(&before.key)
            .expect("lookup should succeed")
            .expect("item must exist"),
        after
    );
}

#[test]
fn undo_of_delete_restores_binary_payload_exactly() {
    let dir = temp_storage_dir("delete");
    let engine = open_engine(&dir);

    let payload: Vec<u8> = (0u16..=255).map(|value| value as u8).collect();
    let item = engine
        .save_content(
            None,
            SaveContentRequest {
                text: "with attachment".to_string(),
                media: vec![MediaEntry {
                    id: String::new(),
                    kind: MediaKind::Image,
                    name: "shot.png".to_string(),
                    mime_type: Some("image/png".to_string()),
                    payload: Some(payload.clone()),
                    size: None,
                    table: None,
                    table_image_index: None,
                }],
                ..SaveContentRequest::default()
            },
        )
        .expect("save should succeed");

    engine.delete_content(&item.key).expect("delete should succeed");
    engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Delete,
            &item.key,
            Some(item.clone()),
            None,
        )
        .expect("action should record");

    engine.undo(DEFAULT_PROJECT_ID).expect("undo should apply");
    let restored = engine
        .get_content(&item.key)
        .expect("lookup should succeed")
        .expect("item must be restored");
    // The snapshot crossed the text-only session store; the bytes must
    // survive the base64 round trip untouched.
    assert_eq!(restored.media[0].payload.as_ref(), Some(&payload));

    engine.redo(DEFAULT_PROJECT_ID).expect("redo should apply");
    assert!(
        engine
            .get_content(&item.key)
            .expect("lookup should succeed")
            .is_none()
    );
}

#[test]
fn reorder_undo_restores_previous_order_exactly() {
    let dir = temp_storage_dir("reorder");
    let engine = open_engine(&dir);

    let a = save_text(&engine, "a");
    let b = save_text(&engine, "b");
    let before_order = vec![
        OrderUpdate {
            key: a.key.clone(),
            order: 10,
        },
        OrderUpdate {
            key: b.key.clone(),
            order: 5,
        },
    ];
    engine
        .update_order(&before_order)
        .expect("initial order should apply");

    let after_order = vec![
        OrderUpdate {
            key: a.key.clone(),
            order: 0,
        },
        OrderUpdate {
            key: b.key.clone(),
            order: 1,
        },
    ];
    engine
        .update_order(&after_order)
        .expect("reorder batch should apply");
    engine
        .record_reorder(DEFAULT_PROJECT_ID, before_order, after_order)
        .expect("reorder should record");

    let keys: Vec<String> = engine
        .list_content(None)
        .expect("listing should succeed")
        .into_iter()
        .map(|item| item.key)
        .collect();
    assert_eq!(keys, vec![a.key.clone(), b.key.clone()]);

    engine.undo(DEFAULT_PROJECT_ID).expect("undo should apply");
    let keys: Vec<String> = engine
        .list_content(None)
        .expect("listing should succeed")
        .into_iter()
        .map(|item| item.key)
        .collect();
    assert_eq!(keys, vec![b.key.clone(), a.key.clone()]);

    engine.redo(DEFAULT_PROJECT_ID).expect("redo should apply");
    let keys: Vec<String> = engine
        .list_content(None)
        .expect("listing should succeed")
        .into_iter()
        .map(|item| item.key)
        .collect();
    assert_eq!(keys, vec![a.key, b.key]);
}

#[test]
fn new_action_clears_redo_stack() {
    let dir = temp_storage_dir("redo-clear");
    let engine = open_engine(&dir);

    let item = save_text(&engine, "one");
    engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Create,
            &item.key,
            None,
            Some(item.clone()),
        )
        .expect("action should record");
    engine.undo(DEFAULT_PROJECT_ID).expect("undo should apply");
    assert_eq!(
        engine
            .history_counts(DEFAULT_PROJECT_ID)
            .expect("counts should read"),
        (0, 1)
    );

    let second = save_text(&engine, "two");
    engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Create,
            &second.key,
            None,
            Some(second.clone()),
        )
        .expect("action should record");
    assert_eq!(
        engine
            .history_counts(DEFAULT_PROJECT_ID)
            .expect("counts should read"),
        (1, 0),
        "recording anything new must drop the redo side"
    );
}

#[test]
fn snapshot_shape_is_validated_per_kind() {
    let dir = temp_storage_dir("shape");
    let engine = open_engine(&dir);

    let item = save_text(&engine, "shaped");
    let err = engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Create,
            &item.key,
            Some(item.clone()),
            Some(item.clone()),
        )
        .expect_err("create with a before snapshot must be rejected");
    assert_eq!(err.code(), "VALIDATION");

    let err = engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Update,
            &item.key,
            None,
            Some(item.clone()),
        )
        .expect_err("update without a before snapshot must be rejected");
    assert_eq!(err.code(), "VALIDATION");
}

#[test]
fn cap_evicts_oldest_action_first() {
    let dir = temp_storage_dir("cap");
    let engine = open_engine(&dir);

    let mut keys = Vec::new();
    for index in 0..51 {
        let item = save_text(&engine, &format!("item {index}"));
        engine
            .record_action(
                DEFAULT_PROJECT_ID,
                ActionKind::Create,
                &item.key,
                None,
                Some(item.clone()),
            )
            .expect("action should record");
        keys.push(item.key);
    }

    let (undo_len, _) = engine
        .history_counts(DEFAULT_PROJECT_ID)
        .expect("counts should read");
    assert_eq!(undo_len, 50, "the 51st action evicts the oldest");

    for _ in 0..50 {
        engine
            .undo(DEFAULT_PROJECT_ID)
            .expect("undo should apply")
            .expect("stack must not run dry early");
    }
    assert_eq!(
        engine.undo(DEFAULT_PROJECT_ID).expect("undo past the end is a no-op"),
        None
    );

    // Everything except the very first create was undone. The first item's
    // action was evicted at the cap, so that create is unrecoverable and
    // the item survives every undo.
    let remaining: Vec<String> = engine
        .list_content(None)
        .expect("listing should succeed")
        .into_iter()
        .map(|item| item.key)
        .collect();
    assert_eq!(remaining, vec![keys[0].clone()]);
}

#[test]
fn undo_stacks_are_isolated_per_project() {
    let dir = temp_storage_dir("isolation");
    let engine = open_engine(&dir);

    let other = engine.create_project("Other").expect("create should succeed");
    let item = save_text(&engine, "default-side");
    engine
        .record_action(
            DEFAULT_PROJECT_ID,
            ActionKind::Create,
            &item.key,
            None,
            Some(item.clone()),
        )
        .expect("action should record");

    assert_eq!(
        engine
            .history_counts(&other.key)
            .expect("counts should read"),
        (0, 0)
    );
    assert_eq!(
        engine.undo(&other.key).expect("undo on empty stack is a no-op"),
        None
    );
    assert_eq!(
        engine
            .history_counts(DEFAULT_PROJECT_ID)
            .expect("counts should read"),
        (1, 0),
        "the other project's no-op undo must not touch this stack"
    );
}

#[test]
fn ledger_is_session_scoped_not_durable() {
    let dir = temp_storage_dir("session");
    {
        let engine = open_engine(&dir);
        let item = save_text(&engine, "persisted");
        engine
            .record_action(
                DEFAULT_PROJECT_ID,
                ActionKind::Create,
                &item.key,
                None,
                Some(item.clone()),
            )
            .expect("action should record");
        assert_eq!(
            engine
                .history_counts(DEFAULT_PROJECT_ID)
                .expect("counts should read"),
            (1, 0)
        );
    }

    let engine = open_engine(&dir);
    assert_eq!(
        engine
            .history_counts(DEFAULT_PROJECT_ID)
            .expect("counts should read"),
        (0, 0),
        "a fresh session starts with an empty ledger"
    );
    assert_eq!(
        engine
            .list_content(None)
            .expect("listing should succeed")
            .len(),
        1,
        "the durable record itself survives"
    );
}

// Session store seeded with a corrupt ledger entry, to exercise error
// propagation out of the ledger without losing the backing trait's shape.
struct SeededSession {
    inner: MemorySessionStore,
}

impl SessionStore for SeededSession {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn put(&mut self, key: &str, value: String) {
        self.inner.put(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.inner.remove(key);
    }
}

#[test]
fn corrupt_ledger_surfaces_as_state_corruption() {
    let dir = temp_storage_dir("corrupt");
    let mut inner = MemorySessionStore::default();
    inner.put(
        &format!("history:{DEFAULT_PROJECT_ID}"),
        "not json".to_string(),
    );
    let options = EngineOptions {
        maintenance: false,
        ..EngineOptions::default()
    };
    let engine =
        StorageEngine::open_with_options(&dir, options, Box::new(SeededSession { inner }))
            .expect("engine should open");

    let err = engine
        .undo(DEFAULT_PROJECT_ID)
        .expect_err("a corrupt ledger entry must surface");
    assert_eq!(err.code(), "STATE_CORRUPTION");
}
