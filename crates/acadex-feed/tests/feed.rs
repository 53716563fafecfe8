//! Feed hub integration tests against the memory store.

use std::sync::Arc;
use std::time::Duration;

use acadex_feed::{FeedConfig, FeedError, FeedHub, Subscription};
use acadex_protocol::{
    AttendanceRecord, Change, FeedEvent, FeedItem, GeoPoint, InstituteId, RecordId, Session,
    StudentId, Topic,
};
use acadex_session::{AttendanceStore, MemoryStore, NewSessionRequest, SessionRegistry};
use chrono::Utc;

// =========================================================================
// Helpers
// =========================================================================

fn institute() -> InstituteId {
    InstituteId::from("inst-1")
}

fn active_topic() -> Topic {
    Topic::ActiveSession {
        institute_id: institute(),
    }
}

async fn setup() -> (Arc<MemoryStore>, SessionRegistry<MemoryStore>, FeedHub) {
    let store = Arc::new(MemoryStore::new());
    let registry = SessionRegistry::new(Arc::clone(&store));
    let hub = FeedHub::spawn(Arc::clone(&store), FeedConfig::default()).await;
    (store, registry, hub)
}

async fn start(registry: &SessionRegistry<MemoryStore>, subject: &str) -> Session {
    registry
        .start_session(NewSessionRequest {
            institute_id: institute(),
            teacher_id: "t-1".into(),
            teacher_name: Some("Prof. Rao".into()),
            subject: subject.into(),
            department: "CS".into(),
            geofence: GeoPoint::new(18.52, 73.85),
        })
        .await
        .unwrap()
}

fn record(session: &Session, student: &str) -> AttendanceRecord {
    AttendanceRecord {
        id: RecordId::new(),
        session_id: session.id,
        student_id: StudentId::from(student),
        institute_id: session.institute_id.clone(),
        subject: session.subject.clone(),
        marked_at: Utc::now(),
        geolocation: GeoPoint::new(18.52, 73.85),
    }
}

async fn next(sub: &mut Subscription) -> FeedEvent {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for feed event")
        .expect("subscription closed")
}

async fn assert_quiet(sub: &mut Subscription) {
    let got = tokio::time::timeout(Duration::from_millis(100), sub.recv()).await;
    assert!(got.is_err(), "unexpected event: {got:?}");
}

// =========================================================================
// Snapshot then live
// =========================================================================

#[tokio::test]
async fn test_subscribe_empty_topic_then_live_added() {
    let (_store, registry, hub) = setup().await;
    let mut sub = hub.subscribe(active_topic()).await.unwrap();
    assert_quiet(&mut sub).await;

    let session = start(&registry, "DBMS").await;
    let event = next(&mut sub).await;
    assert_eq!(event.topic, active_topic());
    assert_eq!(event.change, Change::Added(FeedItem::Session(session)));
}

#[tokio::test]
async fn test_subscribe_delivers_snapshot_first() {
    let (store, registry, hub) = setup().await;
    let session = start(&registry, "DBMS").await;
    store.insert_attendance(record(&session, "s-1")).await.unwrap();
    store.insert_attendance(record(&session, "s-2")).await.unwrap();

    let mut sub = hub
        .subscribe(Topic::Attendance {
            session_id: session.id,
        })
        .await
        .unwrap();

    let first = next(&mut sub).await;
    let second = next(&mut sub).await;
    assert_eq!(first.revision, sub.snapshot_revision());
    assert_eq!(second.revision, sub.snapshot_revision());
    assert!(matches!(first.change, Change::Added(FeedItem::Attendance(ref r)) if r.student_id.as_str() == "s-1"));
    assert!(matches!(second.change, Change::Added(FeedItem::Attendance(ref r)) if r.student_id.as_str() == "s-2"));

    // Nothing already in the snapshot is delivered again.
    assert_quiet(&mut sub).await;

    store.insert_attendance(record(&session, "s-3")).await.unwrap();
    let live = next(&mut sub).await;
    assert!(live.revision > sub.snapshot_revision());
}

#[tokio::test]
async fn test_supersede_removes_then_adds() {
    let (_store, registry, hub) = setup().await;
    let first = start(&registry, "DBMS").await;
    let mut sub = hub.subscribe(active_topic()).await.unwrap();
    assert!(matches!(next(&mut sub).await.change, Change::Added(_)));

    let second = start(&registry, "OS").await;

    let removed = next(&mut sub).await;
    let added = next(&mut sub).await;
    assert!(removed.revision < added.revision);
    match removed.change {
        Change::Removed(FeedItem::Session(s)) => {
            assert_eq!(s.id, first.id);
            assert!(!s.is_active);
        }
        other => panic!("expected Removed, got {other:?}"),
    }
    assert_eq!(added.change, Change::Added(FeedItem::Session(second)));
}

#[tokio::test]
async fn test_end_session_notifies_both_topics() {
    let (_store, registry, hub) = setup().await;
    let session = start(&registry, "DBMS").await;

    let mut slot = hub.subscribe(active_topic()).await.unwrap();
    let mut roster = hub
        .subscribe(Topic::Attendance {
            session_id: session.id,
        })
        .await
        .unwrap();
    next(&mut slot).await; // snapshot

    registry.end_session(session.id).await.unwrap();

    assert!(matches!(next(&mut slot).await.change, Change::Removed(_)));
    match next(&mut roster).await.change {
        Change::Modified(FeedItem::Session(s)) => assert!(s.ended_at.is_some()),
        other => panic!("expected Modified session, got {other:?}"),
    }
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_arrive_in_revision_order() {
    let (store, registry, hub) = setup().await;
    let session = start(&registry, "DBMS").await;
    let mut sub = hub
        .subscribe(Topic::Attendance {
            session_id: session.id,
        })
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..40 {
        let store = Arc::clone(&store);
        let rec = record(&session, &format!("s-{i}"));
        tasks.push(tokio::spawn(async move { store.insert_attendance(rec).await }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    let mut last = 0;
    for _ in 0..40 {
        let event = next(&mut sub).await;
        assert!(event.revision > last, "revisions must strictly increase");
        last = event.revision;
    }
    assert_quiet(&mut sub).await;
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_drop_unsubscribes() {
    let (_store, _registry, hub) = setup().await;
    let sub = hub.subscribe(active_topic()).await.unwrap();
    assert_eq!(hub.stats().await.unwrap().subscribers, 1);

    drop(sub);
    // Stats is queued behind the unsubscribe command.
    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.subscribers, 0);
    assert_eq!(stats.topics, 0);
}

#[tokio::test]
async fn test_topic_limit_enforced() {
    let store = Arc::new(MemoryStore::new());
    let config = FeedConfig {
        max_subscribers_per_topic: 2,
        ..FeedConfig::default()
    };
    let hub = FeedHub::spawn(store, config).await;

    let _a = hub.subscribe(active_topic()).await.unwrap();
    let _b = hub.subscribe(active_topic()).await.unwrap();
    let err = hub.subscribe(active_topic()).await.unwrap_err();
    assert!(matches!(err, FeedError::TopicFull(_)));
    assert!(err.class().is_retryable());

    // Another topic is unaffected.
    hub.subscribe(Topic::ActiveSession {
        institute_id: "inst-2".into(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_offline_store_fails_subscribe() {
    let (store, _registry, hub) = setup().await;
    store.set_offline(true);
    let err = hub.subscribe(active_topic()).await.unwrap_err();
    assert!(matches!(err, FeedError::Store(_)));
    assert!(err.class().is_retryable());
}

#[tokio::test]
async fn test_shutdown_ends_subscriptions() {
    let (_store, _registry, hub) = setup().await;
    let mut sub = hub.subscribe(active_topic()).await.unwrap();
    hub.shutdown().await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .unwrap();
    assert!(end.is_none());
    assert!(matches!(
        hub.subscribe(active_topic()).await,
        Err(FeedError::Unavailable)
    ));
}
