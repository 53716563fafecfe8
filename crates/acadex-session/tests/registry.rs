//! Integration tests for the session registry and the memory store's
//! transactional guarantees.

use std::sync::Arc;

use acadex_protocol::{GeoPoint, InstituteId};
use acadex_session::{
    AttendanceStore, MemoryStore, NewSessionRequest, SessionError, SessionRegistry, StoreError,
};

fn request(institute: &str, subject: &str) -> NewSessionRequest {
    NewSessionRequest {
        institute_id: institute.into(),
        teacher_id: "t1".into(),
        teacher_name: Some("Prof. Iyer".into()),
        subject: subject.into(),
        department: "CS".into(),
        geofence: GeoPoint::new(18.52, 73.85),
    }
}

// =========================================================================
// Supersede
// =========================================================================

#[tokio::test]
async fn test_second_start_supersedes_first() {
    let reg = SessionRegistry::new(Arc::new(MemoryStore::new()));
    let inst: InstituteId = "I1".into();

    let a = reg.start_session(request("I1", "Maths")).await.unwrap();
    let b = reg.start_session(request("I1", "Physics")).await.unwrap();

    let a_now = reg.session(a.id).await.unwrap().unwrap();
    let b_now = reg.session(b.id).await.unwrap().unwrap();
    assert!(!a_now.is_active);
    assert!(b_now.is_active);
    assert_eq!(reg.active_session(&inst).await.unwrap().unwrap().id, b.id);
}

#[tokio::test]
async fn test_end_unknown_session_is_not_found() {
    let reg = SessionRegistry::new(Arc::new(MemoryStore::new()));
    let err = reg
        .end_session(acadex_protocol::SessionId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Store(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_end_then_no_active_session() {
    let reg = SessionRegistry::new(Arc::new(MemoryStore::new()));
    let s = reg.start_session(request("I1", "Maths")).await.unwrap();
    reg.end_session(s.id).await.unwrap();
    assert!(reg.active_session(&"I1".into()).await.unwrap().is_none());
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_leave_one_active() {
    let store = Arc::new(MemoryStore::new());
    let reg = SessionRegistry::new(Arc::clone(&store));

    let mut handles = Vec::new();
    for i in 0..64 {
        let reg = reg.clone();
        handles.push(tokio::spawn(async move {
            reg.start_session(request("I1", &format!("Subject {i}")))
                .await
                .unwrap()
        }));
    }
    let mut started = Vec::new();
    for h in handles {
        started.push(h.await.unwrap());
    }

    let mut active = 0;
    for s in &started {
        if store.session(s.id).await.unwrap().unwrap().is_active {
            active += 1;
        }
    }
    assert_eq!(active, 1, "exactly one session may remain active");

    let winner = reg.active_session(&"I1".into()).await.unwrap().unwrap();
    assert!(started.iter().any(|s| s.id == winner.id));
    assert_eq!(store.class_count(&"I1".into(), "CS").await.unwrap(), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_across_institutes_are_independent() {
    let reg = SessionRegistry::new(Arc::new(MemoryStore::new()));

    let mut handles = Vec::new();
    for i in 0..8 {
        for _ in 0..8 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                reg.start_session(request(&format!("I{i}"), "Maths"))
                    .await
                    .unwrap();
            }));
        }
    }
    for h in handles {
        h.await.unwrap();
    }

    for i in 0..8 {
        let inst: InstituteId = format!("I{i}").as_str().into();
        assert!(reg.active_session(&inst).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_store_outage_surfaces_as_transient() {
    let store = Arc::new(MemoryStore::new());
    let reg = SessionRegistry::new(Arc::clone(&store));
    store.set_offline(true);

    let err = reg.start_session(request("I1", "Maths")).await.unwrap_err();
    assert!(err.class().is_retryable());
}
