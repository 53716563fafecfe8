//! HTTP API.
//!
//! | method | path | |
//! |---|---|---|
//! | POST | `/start-session` | teacher starts a broadcast session, bearer auth |
//! | POST | `/mark-attendance` | student scan, bearer auth |
//! | POST | `/end-session` | teacher ends their own session, bearer auth |
//! | GET | `/sessions/active/{institute_id}` | the institute's active session |
//! | GET | `/sessions/{session_id}/attendance` | roster of a session |
//! | GET | `/sessions/{session_id}/token` | token on the classroom display, teachers only |
//! | GET | `/students/{student_id}/attendance` | recent history, newest first |
//! | GET | `/students/{student_id}/summary` | attendance percentage |
//! | GET | `/timetable/current` | the student's period at `at`, or now in the caller's UTC offset |
//! | GET | `/health` | liveness |
//!
//! Live views use the push feed, not these reads.

use std::sync::Arc;

use acadex_attendance::{AttendanceSummary, AttendanceVerifier, student_summary};
use acadex_protocol::{
    AttendanceRecord, GeoPoint, InstituteId, Role, Session, SessionId, StudentId, TeacherId,
};
use acadex_session::{
    AttendanceStore, Authenticator, EndOutcome, Identity, NewSessionRequest, SessionRegistry,
    StoreError,
};
use acadex_timetable::{DerivedPeriodState, StudentProfile, TimetableResolver, TimetableSource};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::ApiError;
use crate::display::TokenDisplay;

/// Recent-history length when the caller gives no `limit`.
pub const DEFAULT_HISTORY_LIMIT: usize = 3;

/// State shared by every handler.
pub struct AppState<S, A, T> {
    pub registry: SessionRegistry<S>,
    pub verifier: AttendanceVerifier<S>,
    pub timetable: TimetableResolver<T>,
    pub display: Arc<TokenDisplay>,
    pub auth: Arc<A>,
}

impl<S, A, T> Clone for AppState<S, A, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            verifier: self.verifier.clone(),
            timetable: self.timetable.clone(),
            display: Arc::clone(&self.display),
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<S: AttendanceStore, A, T> AppState<S, A, T> {
    fn store(&self) -> &S {
        self.registry.store()
    }
}

/// Build the API router.
pub fn router<S, A, T>(state: AppState<S, A, T>) -> Router
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    Router::new()
        .route("/health", get(health))
        .route("/start-session", post(start_session::<S, A, T>))
        .route("/mark-attendance", post(mark_attendance::<S, A, T>))
        .route("/end-session", post(end_session::<S, A, T>))
        .route(
            "/sessions/active/{institute_id}",
            get(active_session::<S, A, T>),
        )
        .route(
            "/sessions/{session_id}/attendance",
            get(session_roster::<S, A, T>),
        )
        .route(
            "/sessions/{session_id}/token",
            get(display_token::<S, A, T>),
        )
        .route(
            "/students/{student_id}/attendance",
            get(student_history::<S, A, T>),
        )
        .route(
            "/students/{student_id}/summary",
            get(student_summary_handler::<S, A, T>),
        )
        .route("/timetable/current", get(current_period::<S, A, T>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    pub institute_id: Option<InstituteId>,
    /// Optional; when present it must name the caller.
    pub teacher_id: Option<TeacherId>,
    pub teacher_name: Option<String>,
    pub subject: Option<String>,
    pub department: Option<String>,
    pub geolocation: Option<GeoPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    /// First display token. Absent when the rotation could not start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceBody {
    pub session_token: Option<String>,
    pub student_id: Option<StudentId>,
    pub geolocation: Option<GeoPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayTokenResponse {
    pub session_id: SessionId,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub rotates_every_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub message: String,
    pub record: AttendanceRecord,
}

#[derive(Debug, Deserialize)]
pub struct EndSessionBody {
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub message: String,
    pub session_id: SessionId,
    /// False when the session had already ended.
    pub ended: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveSessionResponse {
    pub session: Option<Session>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RosterResponse {
    pub session: Session,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub institute_id: Option<InstituteId>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub institute_id: Option<InstituteId>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub department: Option<String>,
    pub year: Option<String>,
    pub semester: Option<u8>,
    /// Wall-clock time at the institute, e.g. `2026-10-14T10:15:00`.
    pub at: Option<NaiveDateTime>,
    /// The institute's offset from UTC, used when `at` is absent. Without
    /// either, the server's own timezone applies.
    pub utc_offset_minutes: Option<i32>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tracing::instrument(skip_all)]
async fn start_session<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    headers: HeaderMap,
    payload: Result<Json<StartSessionBody>, JsonRejection>,
) -> Result<Json<StartSessionResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let identity = authenticate(&headers, state.auth.as_ref()).await?;
    require_teacher(&identity, "start a session")?;

    let body = json_body(payload)?;
    let geofence = body.geolocation.ok_or(ApiError::MissingGeolocation)?;
    let teacher_id = match body.teacher_id {
        Some(claimed) if claimed.as_str() != identity.user_id => {
            tracing::info!(
                caller = %identity.user_id,
                teacher_id = %claimed,
                "session start on behalf of another teacher rejected"
            );
            return Err(ApiError::Forbidden(
                "sessions can only be started as yourself".into(),
            ));
        }
        _ => TeacherId::from(identity.user_id.as_str()),
    };

    let session = state
        .registry
        .start_session(NewSessionRequest {
            institute_id: body.institute_id.ok_or(ApiError::MissingField("institute_id"))?,
            teacher_id,
            teacher_name: body.teacher_name,
            subject: body.subject.ok_or(ApiError::MissingField("subject"))?,
            department: body.department.ok_or(ApiError::MissingField("department"))?,
            geofence,
        })
        .await?;

    let token = match state.display.start(&session).await {
        Ok(token) => Some(token.encode()),
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "display rotation not started");
            None
        }
    };

    Ok(Json(StartSessionResponse {
        session_id: session.id,
        started_at: session.started_at,
        token,
    }))
}

#[tracing::instrument(skip_all)]
async fn mark_attendance<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    headers: HeaderMap,
    payload: Result<Json<MarkAttendanceBody>, JsonRejection>,
) -> Result<Json<MarkAttendanceResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let identity = authenticate(&headers, state.auth.as_ref()).await?;

    let body = json_body(payload)?;
    let token = body
        .session_token
        .ok_or(ApiError::MissingField("session_token"))?;
    let student_id = body.student_id.ok_or(ApiError::MissingField("student_id"))?;
    let geolocation = body.geolocation.ok_or(ApiError::MissingGeolocation)?;

    if identity.user_id != student_id.as_str() {
        tracing::info!(
            caller = %identity.user_id,
            %student_id,
            "attendance scan for another student rejected"
        );
        return Err(ApiError::Forbidden(
            "attendance can only be marked for yourself".into(),
        ));
    }

    let record = state
        .verifier
        .verify_now(&token, &student_id, geolocation)
        .await?;

    Ok(Json(MarkAttendanceResponse {
        message: "Attendance marked successfully".into(),
        record,
    }))
}

#[tracing::instrument(skip_all)]
async fn end_session<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    headers: HeaderMap,
    payload: Result<Json<EndSessionBody>, JsonRejection>,
) -> Result<Json<EndSessionResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let identity = authenticate(&headers, state.auth.as_ref()).await?;
    require_teacher(&identity, "end a session")?;

    let body = json_body(payload)?;
    let session_id = body.session_id.ok_or(ApiError::MissingField("session_id"))?;

    let session = state
        .registry
        .session(session_id)
        .await?
        .ok_or(StoreError::NotFound(session_id))?;
    if session.teacher_id.as_str() != identity.user_id {
        tracing::info!(
            caller = %identity.user_id,
            %session_id,
            owner = %session.teacher_id,
            "end of another teacher's session rejected"
        );
        return Err(ApiError::Forbidden(
            "only the teacher who started a session can end it".into(),
        ));
    }

    let outcome = state.registry.end_session(session_id).await?;
    let (message, ended) = match outcome {
        EndOutcome::Ended(_) => ("Session ended", true),
        EndOutcome::AlreadyInactive(_) => ("Session was already ended", false),
    };
    Ok(Json(EndSessionResponse {
        message: message.into(),
        session_id,
        ended,
    }))
}

async fn active_session<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    Path(institute_id): Path<String>,
) -> Result<Json<ActiveSessionResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let session = state
        .registry
        .active_session(&InstituteId::from(institute_id.as_str()))
        .await?;
    Ok(Json(ActiveSessionResponse { session }))
}

async fn session_roster<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    Path(session_id): Path<String>,
) -> Result<Json<RosterResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let session_id = parse_session_id(&session_id)?;
    let session = state
        .registry
        .session(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;
    let records = state.store().session_attendance(session_id).await?;
    Ok(Json(RosterResponse { session, records }))
}

async fn display_token<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<DisplayTokenResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let identity = authenticate(&headers, state.auth.as_ref()).await?;
    require_teacher(&identity, "show the session token")?;

    let session_id = parse_session_id(&session_id)?;
    let token = state
        .display
        .current(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no live display for session {session_id}")))?;

    Ok(Json(DisplayTokenResponse {
        session_id,
        token: token.encode(),
        issued_at: token.issued_at,
        rotates_every_secs: state.display.cadence().as_secs(),
    }))
}

async fn student_history<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    Path(student_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let institute_id = query
        .institute_id
        .ok_or(ApiError::MissingField("institute_id"))?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let records = state
        .store()
        .student_attendance(
            &institute_id,
            &StudentId::from(student_id.as_str()),
            Some(limit),
        )
        .await?;
    Ok(Json(HistoryResponse { records }))
}

async fn student_summary_handler<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    Path(student_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AttendanceSummary>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let institute_id = query
        .institute_id
        .ok_or(ApiError::MissingField("institute_id"))?;
    let department = query
        .department
        .filter(|d| !d.trim().is_empty())
        .ok_or(ApiError::MissingField("department"))?;

    let summary = student_summary(
        state.store(),
        &institute_id,
        &StudentId::from(student_id.as_str()),
        &department,
    )
    .await?;
    Ok(Json(summary))
}

async fn current_period<S, A, T>(
    State(state): State<AppState<S, A, T>>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<DerivedPeriodState>, ApiError>
where
    S: AttendanceStore,
    A: Authenticator,
    T: TimetableSource,
{
    let Query(query) = query.map_err(|rejection| ApiError::InvalidParam {
        field: "query",
        value: rejection.body_text(),
    })?;

    // An explicit semester makes the year irrelevant.
    let year = match (query.year, query.semester) {
        (Some(year), _) => year,
        (None, Some(_)) => String::new(),
        (None, None) => return Err(ApiError::MissingField("year")),
    };
    let profile = StudentProfile {
        department: query
            .department
            .ok_or(ApiError::MissingField("department"))?,
        year,
        semester: query.semester,
    };
    let now = match (query.at, query.utc_offset_minutes) {
        (Some(at), _) => at,
        (None, Some(minutes)) => {
            let offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| ApiError::InvalidParam {
                    field: "utc_offset_minutes",
                    value: minutes.to_string(),
                })?;
            Utc::now().with_timezone(&offset).naive_local()
        }
        (None, None) => chrono::Local::now().naive_local(),
    };
    Ok(Json(state.timetable.resolve_at(&profile, now).await))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn json_body<B>(payload: Result<Json<B>, JsonRejection>) -> Result<B, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidParam {
        field: "session_id",
        value: raw.to_owned(),
    })
}

/// Resolve the caller from an `Authorization: Bearer <token>` header.
async fn authenticate<A: Authenticator>(
    headers: &HeaderMap,
    auth: &A,
) -> Result<Identity, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthenticated)?;

    Ok(auth.authenticate(token).await?)
}

fn require_teacher(identity: &Identity, action: &str) -> Result<(), ApiError> {
    if identity.role == Role::Teacher {
        return Ok(());
    }
    tracing::info!(caller = %identity.user_id, role = ?identity.role, action, "teacher-only action rejected");
    Err(ApiError::Forbidden(format!("only teachers can {action}")))
}
