//! Unified error types for the Acadex service.
//!
//! [`AcadexError`] wraps every sub-crate error for code that drives several
//! layers at once (the server, the feed handler). [`ApiError`] is what HTTP
//! handlers return; it owns the status code and the stable error code
//! clients switch on.

use acadex_attendance::AttendanceError;
use acadex_feed::FeedError;
use acadex_protocol::{ErrorClass, ProtocolError};
use acadex_session::{SessionError, StoreError};
use acadex_timetable::TimetableError;
use acadex_transport::TransportError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AcadexError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error(transparent)]
    Timetable(#[from] TimetableError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AcadexError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) | Self::Io(_) => ErrorClass::Transient,
            Self::Protocol(e) => e.class(),
            Self::Session(e) => e.class(),
            Self::Attendance(e) => e.class(),
            // The resolver fails open; a surfaced timetable error is a source
            // outage.
            Self::Timetable(_) => ErrorClass::Transient,
            Self::Feed(e) => e.class(),
            Self::Config(_) => ErrorClass::Precondition,
        }
    }
}

/// An error returned from an HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but not allowed to act for this subject.
    #[error("{0}")]
    Forbidden(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("missing geolocation; enable location access and retry")]
    MissingGeolocation,

    #[error("invalid {field}: {value}")]
    InvalidParam { field: &'static str, value: String },

    /// The request body is not the expected JSON.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Attendance(e) => e.class(),
            Self::Session(e) => e.class(),
            Self::Store(e) => e.class(),
            Self::Unauthenticated
            | Self::Forbidden(_)
            | Self::MissingField(_)
            | Self::MissingGeolocation
            | Self::InvalidParam { .. }
            | Self::InvalidBody(_)
            | Self::NotFound(_) => ErrorClass::Precondition,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Attendance(e) => match e {
                AttendanceError::MalformedToken(_)
                | AttendanceError::InvalidGeolocation
                | AttendanceError::LocationUnavailable(_) => StatusCode::BAD_REQUEST,
                AttendanceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                AttendanceError::SessionInactive(_)
                | AttendanceError::DuplicateAttendance { .. } => StatusCode::CONFLICT,
                AttendanceError::TokenExpired { .. } => StatusCode::GONE,
                AttendanceError::OutOfRange { .. } => StatusCode::FORBIDDEN,
                AttendanceError::Store(e) => store_status(e),
            },
            Self::Session(e) => match e {
                SessionError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
                SessionError::InvalidGeolocation | SessionError::MissingField(_) => {
                    StatusCode::BAD_REQUEST
                }
                SessionError::Store(e) => store_status(e),
            },
            Self::Store(e) => store_status(e),
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MissingField(_)
            | Self::MissingGeolocation
            | Self::InvalidParam { .. }
            | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Attendance(e) => match e {
                AttendanceError::MalformedToken(_) => "MALFORMED_TOKEN",
                AttendanceError::SessionNotFound(_) => "SESSION_NOT_FOUND",
                AttendanceError::SessionInactive(_) => "SESSION_INACTIVE",
                AttendanceError::TokenExpired { .. } => "TOKEN_EXPIRED",
                AttendanceError::DuplicateAttendance { .. } => "DUPLICATE_ATTENDANCE",
                AttendanceError::OutOfRange { .. } => "OUT_OF_RANGE",
                AttendanceError::InvalidGeolocation => "INVALID_GEOLOCATION",
                AttendanceError::LocationUnavailable(_) => "LOCATION_UNAVAILABLE",
                AttendanceError::Store(e) => store_code(e),
            },
            Self::Session(e) => match e {
                SessionError::AuthFailed(_) => "UNAUTHENTICATED",
                SessionError::InvalidGeolocation => "INVALID_GEOLOCATION",
                SessionError::MissingField(_) => "MISSING_FIELD",
                SessionError::Store(e) => store_code(e),
            },
            Self::Store(e) => store_code(e),
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::MissingGeolocation => "MISSING_GEOLOCATION",
            Self::InvalidParam { .. } => "INVALID_PARAMETER",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::UniqueViolation { .. } | StoreError::Inactive(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
        StoreError::UniqueViolation { .. } => "DUPLICATE_ATTENDANCE",
        StoreError::Inactive(_) => "SESSION_INACTIVE",
        StoreError::NotFound(_) => "SESSION_NOT_FOUND",
        StoreError::InvariantViolation(_) => "INVARIANT_VIOLATION",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match self.class() {
            ErrorClass::Precondition => {
                tracing::debug!(code, status = status.as_u16(), %message, "client error");
            }
            ErrorClass::Conflict => {
                tracing::info!(code, status = status.as_u16(), %message, "conflict");
            }
            ErrorClass::Transient => {
                tracing::warn!(code, status = status.as_u16(), %message, "transient failure");
            }
            ErrorClass::InvariantViolation => {
                tracing::error!(critical = true, code, %message, "invariant violation surfaced to client");
            }
        }

        let body = Json(json!({
            "error": message,
            "code": code,
        }));
        (status, body).into_response()
    }
}
