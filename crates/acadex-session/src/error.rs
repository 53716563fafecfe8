//! Error types for the session layer.

use acadex_protocol::{ErrorClass, SessionId, StudentId};

/// Errors raised by an [`AttendanceStore`](crate::AttendanceStore).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached. Retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The (session, student) unique index already holds an entry.
    #[error("attendance already recorded for student {student_id} in session {session_id}")]
    UniqueViolation {
        session_id: SessionId,
        student_id: StudentId,
    },

    /// No session with this id exists.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// A conditional write required an active session.
    #[error("session {0} is not active")]
    Inactive(SessionId),

    /// A uniqueness guarantee was found broken inside a transaction.
    #[error("store invariant violated: {0}")]
    InvariantViolation(String),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unavailable(_) => ErrorClass::Transient,
            Self::UniqueViolation { .. } | Self::Inactive(_) => ErrorClass::Conflict,
            Self::NotFound(_) => ErrorClass::Precondition,
            Self::InvariantViolation(_) => ErrorClass::InvariantViolation,
        }
    }
}

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication failed: the bearer token was missing, invalid, or
    /// rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The teacher's position is not a usable coordinate.
    #[error("invalid geolocation")]
    InvalidGeolocation,

    /// A required field was empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthFailed(_) | Self::InvalidGeolocation | Self::MissingField(_) => {
                ErrorClass::Precondition
            }
            Self::Store(e) => e.class(),
        }
    }
}
