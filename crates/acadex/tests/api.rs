//! HTTP API tests, driven through the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use acadex::display::TokenDisplay;
use acadex::routes::{AppState, router};
use acadex_attendance::{AttendanceVerifier, RotationConfig, VerifierConfig};
use acadex_feed::{FeedConfig, FeedHub};
use acadex_protocol::{AttendanceToken, GeoPoint, Role, SessionId};
use acadex_session::{Identity, MemoryStore, SessionRegistry, StaticAuthenticator};
use acadex_timetable::{
    MemoryTimetable, PeriodKind, Timetable, TimetableKey, TimetableResolver, TimetableSlot,
};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

// =========================================================================
// Helpers
// =========================================================================

const CLASSROOM: GeoPoint = GeoPoint {
    latitude: 18.5204,
    longitude: 73.8567,
};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    timetable: Arc<MemoryTimetable>,
}

async fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let timetable = Arc::new(MemoryTimetable::new());
    let auth = StaticAuthenticator::new()
        .with_token("tok-s1", Identity::new("s1", Role::Student))
        .with_token("tok-s2", Identity::new("s2", Role::Student))
        .with_token("tok-t1", Identity::new("t1", Role::Teacher))
        .with_token("tok-t2", Identity::new("t2", Role::Teacher));
    let hub = FeedHub::spawn(Arc::clone(&store), FeedConfig::default()).await;

    let state = AppState {
        registry: SessionRegistry::new(Arc::clone(&store)),
        verifier: AttendanceVerifier::new(
            Arc::clone(&store),
            VerifierConfig {
                freshness_window: std::time::Duration::from_secs(10),
                geofence_radius_m: Some(100.0),
            },
        ),
        timetable: TimetableResolver::new(Arc::clone(&timetable)),
        display: Arc::new(TokenDisplay::new(hub, RotationConfig::default())),
        auth: Arc::new(auth),
    };
    TestApp {
        router: router(state),
        store,
        timetable,
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_as(uri: &str, bearer: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, bearer: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .unwrap()
}

async fn start_session(app: &TestApp, institute: &str) -> SessionId {
    let (status, body) = send(
        app,
        post_as(
            "/start-session",
            "tok-t1",
            json!({
                "institute_id": institute,
                "teacher_id": "t1",
                "subject": "DBMS",
                "department": "CS",
                "geolocation": CLASSROOM,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["session_id"].as_str().unwrap().parse().unwrap()
}

fn fresh_token(session_id: SessionId) -> String {
    AttendanceToken::new(session_id, Utc::now()).encode()
}

fn scan(token: &str, student: &str) -> Value {
    json!({
        "session_token": token,
        "student_id": student,
        "geolocation": CLASSROOM,
    })
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_start_session_without_geolocation_is_400() {
    let app = app().await;
    let (status, body) = send(
        &app,
        post_as(
            "/start-session",
            "tok-t1",
            json!({
                "institute_id": "I1",
                "teacher_id": "t1",
                "subject": "DBMS",
                "department": "CS",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_GEOLOCATION");
}

#[tokio::test]
async fn test_start_session_missing_subject_is_400() {
    let app = app().await;
    let (status, body) = send(
        &app,
        post_as(
            "/start-session",
            "tok-t1",
            json!({
                "institute_id": "I1",
                "teacher_id": "t1",
                "department": "CS",
                "geolocation": CLASSROOM,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = app().await;
    let req = Request::post("/start-session")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer tok-t1")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_BODY");
}

#[tokio::test]
async fn test_second_start_supersedes_first() {
    let app = app().await;
    let a = start_session(&app, "I1").await;
    let b = start_session(&app, "I1").await;

    let (status, body) = send(&app, get("/sessions/active/I1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["id"], b.to_string());

    let (_, roster) = send(&app, get(&format!("/sessions/{a}/attendance"))).await;
    assert_eq!(roster["session"]["is_active"], false);
}

#[tokio::test]
async fn test_active_session_empty_institute() {
    let app = app().await;
    let (status, body) = send(&app, get("/sessions/active/nowhere")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["session"].is_null());
}

#[tokio::test]
async fn test_end_session_then_again_is_idempotent() {
    let app = app().await;
    let id = start_session(&app, "I1").await;

    let (status, body) = send(&app, post_as("/end-session", "tok-t1", json!({ "session_id": id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], true);

    let (status, body) = send(&app, post_as("/end-session", "tok-t1", json!({ "session_id": id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], false);
}

fn start_body() -> Value {
    json!({
        "institute_id": "I1",
        "teacher_id": "t1",
        "subject": "DBMS",
        "department": "CS",
        "geolocation": CLASSROOM,
    })
}

#[tokio::test]
async fn test_start_session_requires_bearer() {
    let app = app().await;
    let (status, body) = send(&app, post("/start-session", start_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (_, active) = send(&app, get("/sessions/active/I1")).await;
    assert!(active["session"].is_null());
}

#[tokio::test]
async fn test_start_session_as_student_is_403() {
    let app = app().await;
    let (status, body) = send(&app, post_as("/start-session", "tok-s1", start_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert!(body.get("token").is_none());

    let (_, active) = send(&app, get("/sessions/active/I1")).await;
    assert!(active["session"].is_null());
}

#[tokio::test]
async fn test_start_session_for_another_teacher_is_403() {
    let app = app().await;
    let (status, _) = send(&app, post_as("/start-session", "tok-t2", start_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_start_session_takes_teacher_from_identity() {
    let app = app().await;
    let mut body = start_body();
    body.as_object_mut().unwrap().remove("teacher_id");
    let (status, started) = send(&app, post_as("/start-session", "tok-t2", body)).await;
    assert_eq!(status, StatusCode::OK, "{started}");

    let (_, active) = send(&app, get("/sessions/active/I1")).await;
    assert_eq!(active["session"]["teacher_id"], "t2");
}

#[tokio::test]
async fn test_end_session_requires_bearer() {
    let app = app().await;
    let id = start_session(&app, "I1").await;

    let (status, body) = send(&app, post("/end-session", json!({ "session_id": id }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    // The class is still live and accepts scans.
    let (status, _) = send(
        &app,
        post_as("/mark-attendance", "tok-s1", scan(&fresh_token(id), "s1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_end_session_as_student_is_403() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let (status, _) = send(&app, post_as("/end-session", "tok-s1", json!({ "session_id": id }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, active) = send(&app, get("/sessions/active/I1")).await;
    assert_eq!(active["session"]["id"], id.to_string());
}

#[tokio::test]
async fn test_end_other_teachers_session_is_403() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let (status, body) = send(&app, post_as("/end-session", "tok-t2", json!({ "session_id": id }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_end_unknown_session_is_404() {
    let app = app().await;
    let (status, body) = send(
        &app,
        post_as("/end-session", "tok-t1", json!({ "session_id": SessionId::new() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_roster_bad_id_is_400() {
    let app = app().await;
    let (status, body) = send(&app, get("/sessions/not-a-uuid/attendance")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");
}

// =========================================================================
// Display token
// =========================================================================

#[tokio::test]
async fn test_start_session_returns_first_display_token() {
    let app = app().await;
    let (status, body) = send(
        &app,
        post_as(
            "/start-session",
            "tok-t1",
            json!({
                "institute_id": "I1",
                "teacher_id": "t1",
                "subject": "DBMS",
                "department": "CS",
                "geolocation": CLASSROOM,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = AttendanceToken::decode(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(token.session_id.to_string(), body["session_id"].as_str().unwrap());
}

#[tokio::test]
async fn test_display_token_for_teacher() {
    let app = app().await;
    let id = start_session(&app, "I1").await;

    let (status, body) = send(&app, get_as(&format!("/sessions/{id}/token"), "tok-t1")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["rotates_every_secs"], 10);

    // The displayed token is accepted by the verifier.
    let token = body["token"].as_str().unwrap();
    let (status, _) = send(&app, post_as("/mark-attendance", "tok-s1", scan(token, "s1"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_display_token_requires_teacher() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let uri = format!("/sessions/{id}/token");

    let (status, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get_as(&uri, "tok-s1")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_display_token_gone_after_end() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    send(&app, post_as("/end-session", "tok-t1", json!({ "session_id": id }))).await;

    let uri = format!("/sessions/{id}/token");
    let mut last = StatusCode::OK;
    for _ in 0..100 {
        last = send(&app, get_as(&uri, "tok-t1")).await.0;
        if last == StatusCode::NOT_FOUND {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(last, StatusCode::NOT_FOUND);
}

// =========================================================================
// Marking attendance
// =========================================================================

#[tokio::test]
async fn test_mark_attendance_then_duplicate() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let token = fresh_token(id);

    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", scan(&token, "s1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["message"].as_str().unwrap().contains("marked"));

    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", scan(&token, "s1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_ATTENDANCE");

    let (_, roster) = send(&app, get(&format!("/sessions/{id}/attendance"))).await;
    assert_eq!(roster["records"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_attendance_expired_token_is_410() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let stale = AttendanceToken::new(id, Utc::now() - TimeDelta::seconds(12)).encode();

    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", scan(&stale, "s1"))).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_mark_attendance_unknown_session_is_404() {
    let app = app().await;
    let token = fresh_token(SessionId::new());
    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", scan(&token, "s1"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_mark_attendance_ended_session_is_409() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let token = fresh_token(id);
    send(&app, post_as("/end-session", "tok-t1", json!({ "session_id": id }))).await;

    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", scan(&token, "s1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SESSION_INACTIVE");
}

#[tokio::test]
async fn test_mark_attendance_requires_bearer() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let (status, body) = send(&app, post("/mark-attendance", scan(&fresh_token(id), "s1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = send(
        &app,
        post_as("/mark-attendance", "bogus", scan(&fresh_token(id), "s1")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mark_attendance_for_someone_else_is_403() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let (status, body) = send(
        &app,
        post_as("/mark-attendance", "tok-s2", scan(&fresh_token(id), "s1")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_mark_attendance_out_of_range_is_403() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let far = json!({
        "session_token": fresh_token(id),
        "student_id": "s1",
        "geolocation": { "latitude": 18.6, "longitude": 73.9 },
    });
    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", far)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "OUT_OF_RANGE");
}

#[tokio::test]
async fn test_mark_attendance_without_geolocation_is_400() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    let body = json!({ "session_token": fresh_token(id), "student_id": "s1" });
    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_GEOLOCATION");
}

#[tokio::test]
async fn test_mark_attendance_garbage_token_is_400() {
    let app = app().await;
    let (status, body) = send(&app, post_as("/mark-attendance", "tok-s1", scan("garbage", "s1"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MALFORMED_TOKEN");
}

#[tokio::test]
async fn test_store_outage_is_503() {
    let app = app().await;
    let id = start_session(&app, "I1").await;
    app.store.set_offline(true);
    let (status, body) = send(
        &app,
        post_as("/mark-attendance", "tok-s1", scan(&fresh_token(id), "s1")),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STORE_UNAVAILABLE");
}

// =========================================================================
// Student reads
// =========================================================================

#[tokio::test]
async fn test_history_newest_first_with_default_limit() {
    let app = app().await;
    for _ in 0..4 {
        let id = start_session(&app, "I1").await;
        let (status, _) = send(
            &app,
            post_as("/mark-attendance", "tok-s1", scan(&fresh_token(id), "s1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get("/students/s1/attendance?institute_id=I1")).await;
    assert_eq!(status, StatusCode::OK);
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    let times: Vec<DateTime<Utc>> = records
        .iter()
        .map(|r| r["marked_at"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(times.windows(2).all(|w| w[0] >= w[1]), "{times:?}");

    let (_, body) = send(&app, get("/students/s1/attendance?institute_id=I1&limit=10")).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_history_requires_institute() {
    let app = app().await;
    let (status, body) = send(&app, get("/students/s1/attendance")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_summary_percentage_and_standing() {
    let app = app().await;
    for i in 0..4 {
        let id = start_session(&app, "I1").await;
        if i < 3 {
            send(
                &app,
                post_as("/mark-attendance", "tok-s1", scan(&fresh_token(id), "s1")),
            )
            .await;
        }
    }

    let (status, body) = send(
        &app,
        get("/students/s1/summary?institute_id=I1&department=CS"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attended"], 3);
    assert_eq!(body["total"], 4);
    assert_eq!(body["percentage"], 75);
    assert_eq!(body["standing"], "good");
}

// =========================================================================
// Timetable
// =========================================================================

#[tokio::test]
async fn test_current_period_without_timetable_is_free() {
    let app = app().await;
    let (status, body) = send(&app, get("/timetable/current?department=ME&year=FE")).await;
    assert_eq!(status, StatusCode::OK);
    // Free, or Holiday when the test runs on a Sunday.
    let kind = body["type"].as_str().unwrap().to_ascii_lowercase();
    assert!(kind == "free" || kind == "holiday", "{body}");
}

#[tokio::test]
async fn test_current_period_reads_todays_document() {
    let app = app().await;
    let weekday = chrono::Local::now().weekday();
    app.timetable
        .insert(
            &TimetableKey {
                department: "CS".into(),
                semester: 3,
                weekday,
            },
            Timetable {
                slots: vec![TimetableSlot {
                    start_time: "00:00".parse().unwrap(),
                    end_time: "24:00".parse().unwrap(),
                    subject: Some("Marathon".into()),
                    kind: PeriodKind::Class,
                }],
            },
        )
        .await;

    let (status, body) = send(&app, get("/timetable/current?department=CS&semester=3")).await;
    assert_eq!(status, StatusCode::OK);
    if weekday != chrono::Weekday::Sun {
        assert_eq!(body["subject"], "Marathon");
    }
}

#[tokio::test]
async fn test_current_period_requires_year_or_semester() {
    let app = app().await;
    let (status, body) = send(&app, get("/timetable/current?department=CS")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

async fn seed_wednesday(app: &TestApp) {
    app.timetable
        .insert(
            &TimetableKey {
                department: "CS".into(),
                semester: 3,
                weekday: chrono::Weekday::Wed,
            },
            Timetable {
                slots: vec![
                    TimetableSlot {
                        start_time: "09:00".parse().unwrap(),
                        end_time: "10:00".parse().unwrap(),
                        subject: Some("DBMS".into()),
                        kind: PeriodKind::Class,
                    },
                    TimetableSlot {
                        start_time: "10:00".parse().unwrap(),
                        end_time: "11:00".parse().unwrap(),
                        subject: None,
                        kind: PeriodKind::Free,
                    },
                ],
            },
        )
        .await;
}

#[tokio::test]
async fn test_current_period_at_explicit_time() {
    let app = app().await;
    seed_wednesday(&app).await;

    // 2026-10-14 is a Wednesday.
    let (status, body) = send(
        &app,
        get("/timetable/current?department=CS&semester=3&at=2026-10-14T09:30:00"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["type"], "Class");
    assert_eq!(body["subject"], "DBMS");

    let (_, body) = send(
        &app,
        get("/timetable/current?department=CS&semester=3&at=2026-10-14T10:15:00"),
    )
    .await;
    assert_eq!(body["type"], "Free");

    // 2026-10-18 is a Sunday.
    let (_, body) = send(
        &app,
        get("/timetable/current?department=CS&semester=3&at=2026-10-18T09:30:00"),
    )
    .await;
    assert_eq!(body["type"], "Holiday");
    assert_eq!(body["subject"], "Weekend! Relax.");
}

#[tokio::test]
async fn test_current_period_with_utc_offset() {
    let app = app().await;
    let (status, body) = send(
        &app,
        get("/timetable/current?department=CS&semester=3&utc_offset_minutes=330"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_current_period_rejects_bad_time_inputs() {
    let app = app().await;
    let (status, body) = send(
        &app,
        get("/timetable/current?department=CS&semester=3&utc_offset_minutes=100000"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");

    let (status, body) = send(
        &app,
        get("/timetable/current?department=CS&semester=3&at=yesterday"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");
}

