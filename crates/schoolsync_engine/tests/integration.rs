//! Integration tests for the sync agent against a file-backed station database.

use schoolsync_engine::{
    AssetConfig, BootstrapOutcome, MockTransport, RecordedRequest, RetryConfig, SyncAgent,
    SyncAgentConfig, SyncError, SyncTransport,
};
use schoolsync_protocol::{
    ActionType, FileDiffResponse, FileListResponse, NewChange, PullResponse, RemoteChangeEvent,
    Row, SnapshotResponse, TableRows, WireEvent,
};
use schoolsync_store::LocalStore;
use schoolsync_testkit::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

fn config(db: &TestDatabase) -> SyncAgentConfig {
    SyncAgentConfig::new(db.path())
        .with_push_url("https://cloud.example/sync/push")
        .with_credentials("tenant-1", "key-1")
        .with_station_id("station-1")
        .with_lock_dir(db.dir())
        .with_assets(AssetConfig {
            enabled: false,
            ..Default::default()
        })
}

fn decode(value: Value) -> RemoteChangeEvent {
    let wire: WireEvent = serde_json::from_value(value).unwrap();
    RemoteChangeEvent::from_wire(wire).unwrap()
}

fn seeded(db: &TestDatabase) {
    let conn = db.connect();
    insert_student(&conn, 12, "S12", "Dana", "Levi", Some("5A"), 12);
    insert_teacher(&conn, 1, "Ruth", Some("C-1"));
}

fn append_changes(store: &LocalStore, count: i64) {
    for id in 1..=count {
        store
            .append_change(&NewChange::new(
                "student_points",
                Some(id.to_string()),
                ActionType::Update,
                json!({"old_points": 0, "new_points": id}),
            ))
            .unwrap();
    }
}

#[test]
fn push_sends_limited_batch_and_marks_it() {
    let db = TestDatabase::new();
    seeded(&db);
    let mut agent = SyncAgent::open(config(&db).with_push_batch_size(2), MockTransport::new()).unwrap();
    append_changes(agent.store(), 4);

    let report = agent.run_cycle();
    assert!(report.is_success());
    assert_eq!(report.push.unwrap().acknowledged, 2);
    assert_eq!(agent.store().pending_count().unwrap(), 2);

    let conn = db.connect();
    assert_eq!(count_rows(&conn, "change_log", Some("synced_at IS NOT NULL AND id <= 2")), 2);
}

#[test]
fn failed_push_marks_nothing() {
    let db = TestDatabase::new();
    seeded(&db);
    let transport = MockTransport::new();
    transport.queue_push(Err(SyncError::transport_retryable("connection reset")));
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();
    append_changes(agent.store(), 3);

    let report = agent.run_cycle();
    assert!(!report.is_success());
    assert_eq!(agent.store().pending_count().unwrap(), 3);
}

#[test]
fn remote_points_are_merged_as_delta() {
    let db = TestDatabase::new();
    seeded(&db);
    let transport = MockTransport::new();
    transport.queue_pull(Ok(PullResponse::new(
        vec![decode(points_event(1, 12, 10, 15))],
        Some(1),
    )));
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();

    assert!(agent.run_cycle().is_success());

    let conn = db.connect();
    assert_eq!(student_points(&conn, 12), Some(17));
    assert_eq!(
        count_rows(&conn, "points_log", Some("student_id = 12 AND delta = 5 AND new_points = 17")),
        1
    );
}

#[test]
fn pull_batch_is_all_or_nothing() {
    let db = TestDatabase::new();
    seeded(&db);
    let broken = json!({
        "id": 3, "event_id": "evt-3", "entity_type": "message", "entity_id": 7,
        "action_type": "create", "payload": {"message_type": "info"}
    });
    let items = vec![
        decode(points_event(1, 12, 0, 1)),
        decode(points_event(2, 12, 0, 1)),
        decode(broken),
        decode(points_event(4, 12, 0, 1)),
        decode(points_event(5, 12, 0, 1)),
    ];
    let transport = MockTransport::new();
    transport.queue_pull(Ok(PullResponse::new(items, Some(5))));
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();

    let report = agent.run_cycle();
    assert!(!report.is_success());

    let conn = db.connect();
    assert_eq!(student_points(&conn, 12), Some(12));
    assert_eq!(count_rows(&conn, "applied_events", None), 0);
    for later in ["evt-4", "evt-5"] {
        assert!(!agent.store().is_applied(later).unwrap());
    }
    assert_eq!(agent.store().pull_cursor().unwrap(), 0);
}

#[test]
fn repeated_pull_applies_once() {
    let db = TestDatabase::new();
    seeded(&db);
    let batch = PullResponse::new(
        vec![decode(points_event(1, 12, 0, 4)), decode(points_event(2, 12, 4, 6))],
        Some(2),
    );
    let transport = MockTransport::new();
    transport.queue_pull(Ok(batch.clone()));
    transport.queue_pull(Ok(batch));
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();

    agent.run_cycle();
    agent.run_cycle();

    let conn = db.connect();
    assert_eq!(student_points(&conn, 12), Some(18));
    assert_eq!(count_rows(&conn, "points_log", None), 2);
    assert_eq!(count_rows(&conn, "applied_events", None), 2);
}

#[test]
fn cursor_only_moves_forward() {
    let db = TestDatabase::new();
    seeded(&db);
    let transport = MockTransport::new();
    transport.queue_pull(Ok(PullResponse::new(vec![decode(points_event(30, 12, 0, 1))], Some(30))));
    transport.queue_pull(Ok(PullResponse::new(Vec::new(), Some(10))));
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();

    agent.run_cycle();
    assert_eq!(agent.store().pull_cursor().unwrap(), 30);
    agent.run_cycle();
    assert_eq!(agent.store().pull_cursor().unwrap(), 30);
}

fn student_snapshot(last_event_id: Option<i64>) -> SnapshotResponse {
    let mut student = Row::new();
    student.insert("id".into(), json!(1));
    student.insert("first_name".into(), json!("Noa"));
    student.insert("last_name".into(), json!("Cohen"));
    student.insert("class_name".into(), json!("3B"));
    student.insert("points".into(), json!(50));
    let mut validation = Row::new();
    validation.insert("id".into(), json!(1));
    validation.insert("card_number".into(), json!("X"));

    let mut tables = TableRows::new();
    tables.insert("students".into(), vec![student]);
    tables.insert("card_validations".into(), vec![validation]);
    SnapshotResponse {
        tables,
        last_event_id,
    }
}

#[test]
fn fresh_station_bootstraps_from_snapshot() {
    let db = TestDatabase::new();
    let transport = MockTransport::new();
    transport.queue_snapshot(Ok(student_snapshot(Some(500))));
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();

    let report = agent.run_cycle();
    assert!(report.is_success());
    assert!(matches!(
        report.bootstrap,
        Some(BootstrapOutcome::Applied { cursor: Some(500), .. })
    ));

    let conn = db.connect();
    assert_eq!(student_points(&conn, 1), Some(50));
    assert_eq!(count_rows(&conn, "card_validations", None), 0);
    assert_eq!(agent.store().pull_cursor().unwrap(), 500);
    assert!(agent.store().is_bootstrapped().unwrap());
}

#[test]
fn bootstrap_happens_once() {
    let db = TestDatabase::new();
    {
        let transport = MockTransport::new();
        transport.queue_snapshot(Ok(student_snapshot(Some(5))));
        let mut agent = SyncAgent::open(config(&db), transport).unwrap();
        agent.run_cycle();
    }
    db.connect().execute("DELETE FROM students", []).unwrap();

    let transport = MockTransport::new();
    let mut agent = SyncAgent::open(config(&db), transport).unwrap();
    let report = agent.run_cycle();
    assert!(matches!(report.bootstrap, Some(BootstrapOutcome::NotNeeded { .. })));
}

#[test]
fn second_agent_on_same_database_is_refused() {
    let db = TestDatabase::new();
    let _first = SyncAgent::open(config(&db), MockTransport::new()).unwrap();
    let second = SyncAgent::open(config(&db), MockTransport::new());
    assert!(matches!(second, Err(SyncError::Lock { .. })));
}

#[test]
fn backoff_grows_and_resets() {
    let db = TestDatabase::new();
    seeded(&db);
    let transport = MockTransport::new();
    for _ in 0..3 {
        transport.queue_pull(Err(SyncError::Server {
            status: 503,
            body: "maintenance".into(),
        }));
    }
    let mut agent = SyncAgent::open(
        config(&db).with_poll_interval(Duration::from_secs(60)),
        transport,
    )
    .unwrap();
    agent.set_retry(
        RetryConfig::new(Duration::from_secs(60))
            .with_max_delay(Duration::from_secs(300))
            .without_jitter(),
    );

    let mut delays = Vec::new();
    for _ in 0..4 {
        agent.run_cycle();
        delays.push(agent.next_delay().as_secs());
    }
    assert_eq!(delays, vec![120, 240, 300, 60]);
}

#[test]
fn assets_are_reconciled_next_to_the_database() {
    let db = TestDatabase::new();
    seeded(&db);
    fs::create_dir_all(db.dir().join("images")).unwrap();
    fs::write(db.dir().join("images/logo.png"), b"logo").unwrap();

    let transport = MockTransport::new();
    transport.queue_files_diff(Ok(FileDiffResponse {
        missing: vec!["images/logo.png".into()],
    }));
    let mut remote = BTreeMap::new();
    remote.insert("sounds/bell.mp3".to_string(), "feed".to_string());
    transport.queue_files_list(Ok(FileListResponse { manifest: remote }));
    transport.serve_file("sounds/bell.mp3", b"ring".to_vec());

    let mut agent = SyncAgent::open(
        config(&db).with_assets(AssetConfig::default()),
        transport,
    )
    .unwrap();
    let report = agent.run_cycle();

    let assets = report.assets.unwrap();
    assert_eq!(assets.uploaded, 1);
    assert_eq!(assets.downloaded, 1);
    assert_eq!(fs::read(db.dir().join("sounds/bell.mp3")).unwrap(), b"ring");
}

#[test]
fn seed_push_exports_local_anchors() {
    let db = TestDatabase::new();
    seeded(&db);
    let agent = SyncAgent::open(config(&db), MockTransport::new()).unwrap();

    assert_eq!(agent.push_full_snapshot().unwrap(), (1, 1));
}

#[test]
fn mock_transport_is_object_safe() {
    let transport: Box<dyn SyncTransport> = Box::new(MockTransport::new());
    transport.pull(0, 10).unwrap();
    let recorded = MockTransport::new();
    recorded.pull(3, 7).unwrap();
    assert_eq!(
        recorded.requests(),
        vec![RecordedRequest::Pull { since_id: 3, limit: 7 }]
    );
}
