//! Error types for attendance verification.

use acadex_protocol::{ErrorClass, ProtocolError, SessionId, StudentId};
use acadex_session::StoreError;

/// Why a scan was rejected.
///
/// Expired and duplicate scans are distinct variants with distinct messages
/// so the student knows whether to rescan.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// The scanned string is not a token.
    #[error(transparent)]
    MalformedToken(#[from] ProtocolError),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} has ended")]
    SessionInactive(SessionId),

    /// The token is outside the freshness window. Rescan the live code.
    #[error("token expired ({age_ms} ms old, window {window_ms} ms); scan the current code")]
    TokenExpired { age_ms: i64, window_ms: i64 },

    /// The student is already marked present. Callers treat this as a soft
    /// success.
    #[error("attendance already marked for {student_id} in session {session_id}")]
    DuplicateAttendance {
        session_id: SessionId,
        student_id: StudentId,
    },

    #[error("{distance_m:.0} m from the classroom, limit is {radius_m:.0} m")]
    OutOfRange { distance_m: f64, radius_m: f64 },

    #[error("invalid geolocation")]
    InvalidGeolocation,

    /// No position fix arrived in time, or the device refused one.
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error(transparent)]
    Store(StoreError),
}

impl AttendanceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedToken(_)
            | Self::SessionNotFound(_)
            | Self::TokenExpired { .. }
            | Self::OutOfRange { .. }
            | Self::InvalidGeolocation
            | Self::LocationUnavailable(_) => ErrorClass::Precondition,
            Self::DuplicateAttendance { .. } | Self::SessionInactive(_) => ErrorClass::Conflict,
            Self::Store(e) => e.class(),
        }
    }
}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::SessionNotFound(id),
            StoreError::Inactive(id) => Self::SessionInactive(id),
            StoreError::UniqueViolation {
                session_id,
                student_id,
            } => Self::DuplicateAttendance {
                session_id,
                student_id,
            },
            other => Self::Store(other),
        }
    }
}
