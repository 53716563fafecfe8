//! The session registry: start, end, and look up broadcast sessions.
//!
//! The registry owns the lifecycle rules (validation, logging, idempotent
//! ending). The single-active-session rule itself is enforced one layer
//! down, inside the store's `start_session` transaction, so there is no
//! check-then-write window here to race through.

use std::sync::Arc;

use acadex_protocol::{GeoPoint, InstituteId, Session, SessionId, TeacherId};
use chrono::Utc;

use crate::{AttendanceStore, EndOutcome, NewSession, SessionError};

/// A teacher's request to start a class.
#[derive(Debug, Clone)]
pub struct NewSessionRequest {
    pub institute_id: InstituteId,
    pub teacher_id: TeacherId,
    pub teacher_name: Option<String>,
    pub subject: String,
    pub department: String,
    /// The teacher's position. Acquiring it (and timing out) is the
    /// caller's job; the registry never retries it.
    pub geofence: GeoPoint,
}

/// Manages broadcast sessions for every institute.
///
/// ## Lifecycle
///
/// ```text
/// start_session() ──→ [Active] ──→ end_session() ──→ [Inactive]
///                        │
///                        └── start_session() for the same institute
///                              supersedes it ──→ [Inactive]
/// ```
pub struct SessionRegistry<S> {
    store: Arc<S>,
}

impl<S> Clone for SessionRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: AttendanceStore> SessionRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Start a session, superseding the institute's active one if any.
    ///
    /// # Errors
    /// - [`SessionError::MissingField`] for an empty id, subject, or department
    /// - [`SessionError::InvalidGeolocation`] for an out-of-range coordinate
    /// - [`SessionError::Store`] if the transaction fails
    pub async fn start_session(&self, req: NewSessionRequest) -> Result<Session, SessionError> {
        if req.institute_id.as_str().trim().is_empty() {
            return Err(SessionError::MissingField("institute_id"));
        }
        if req.teacher_id.as_str().trim().is_empty() {
            return Err(SessionError::MissingField("teacher_id"));
        }
        if req.subject.trim().is_empty() {
            return Err(SessionError::MissingField("subject"));
        }
        if req.department.trim().is_empty() {
            return Err(SessionError::MissingField("department"));
        }
        if !req.geofence.is_valid() {
            return Err(SessionError::InvalidGeolocation);
        }

        let started = self
            .store
            .start_session(NewSession {
                institute_id: req.institute_id,
                teacher_id: req.teacher_id,
                teacher_name: req.teacher_name,
                subject: req.subject,
                department: req.department,
                geofence: req.geofence,
                started_at: Utc::now(),
            })
            .await?;

        let session = started.session;
        if let Some(prev) = &started.superseded {
            tracing::info!(
                institute_id = %session.institute_id,
                superseded = %prev.id,
                "previous active session superseded"
            );
        }
        tracing::info!(
            session_id = %session.id,
            institute_id = %session.institute_id,
            teacher_id = %session.teacher_id,
            subject = %session.subject,
            "session started"
        );
        Ok(session)
    }

    /// End a session. Ending an already-inactive session is a no-op.
    ///
    /// # Errors
    /// [`SessionError::Store`] wrapping `NotFound` if the id is unknown.
    pub async fn end_session(&self, session_id: SessionId) -> Result<EndOutcome, SessionError> {
        let outcome = self.store.end_session(session_id, Utc::now()).await?;
        match &outcome {
            EndOutcome::Ended(s) => {
                tracing::info!(%session_id, institute_id = %s.institute_id, "session ended");
            }
            EndOutcome::AlreadyInactive(_) => {
                tracing::debug!(%session_id, "end requested for inactive session, ignoring");
            }
        }
        Ok(outcome)
    }

    pub async fn active_session(
        &self,
        institute_id: &InstituteId,
    ) -> Result<Option<Session>, SessionError> {
        Ok(self.store.active_session(institute_id).await?)
    }

    pub async fn session(&self, session_id: SessionId) -> Result<Option<Session>, SessionError> {
        Ok(self.store.session(session_id).await?)
    }
}
