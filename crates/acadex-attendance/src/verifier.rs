//! The authoritative accept/reject decision for a scan.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the token decodes ([`AttendanceError::MalformedToken`])
//! 2. its session exists ([`AttendanceError::SessionNotFound`])
//! 3. the session is active ([`AttendanceError::SessionInactive`])
//! 4. the token is fresh ([`AttendanceError::TokenExpired`])
//! 5. no record exists for the pair ([`AttendanceError::DuplicateAttendance`])
//! 6. the student is inside the geofence ([`AttendanceError::OutOfRange`])
//!
//! Step 5 is the store's unique index, checked by the insert itself, so two
//! concurrent identical scans cannot both pass. The insert also re-checks
//! step 3 inside the same write, which makes an `end_session` effective for
//! every scan that commits after it.

use std::sync::Arc;
use std::time::Duration;

use acadex_protocol::{AttendanceRecord, AttendanceToken, GeoPoint, RecordId, StudentId};
use acadex_session::{AttendanceStore, StoreError};
use chrono::{DateTime, TimeDelta, Utc};

use crate::{AttendanceError, distance_m};

/// Configuration for an [`AttendanceVerifier`].
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Maximum token age at receipt. Applied in both directions, so a token
    /// stamped further in the future than this is also rejected.
    pub freshness_window: Duration,
    /// Maximum distance from the session's geofence. `None` disables the
    /// range check.
    pub geofence_radius_m: Option<f64>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(15),
            geofence_radius_m: Some(100.0),
        }
    }
}

impl VerifierConfig {
    /// Clamp nonsense values.
    pub fn validated(mut self) -> Self {
        if self.freshness_window.is_zero() {
            tracing::warn!("freshness window of zero would reject every scan, using 1s");
            self.freshness_window = Duration::from_secs(1);
        }
        if let Some(r) = self.geofence_radius_m {
            if !r.is_finite() || r <= 0.0 {
                tracing::warn!(radius_m = r, "invalid geofence radius, disabling range check");
                self.geofence_radius_m = None;
            }
        }
        self
    }
}

/// Validates scans and records attendance.
pub struct AttendanceVerifier<S> {
    store: Arc<S>,
    config: VerifierConfig,
    window: TimeDelta,
}

impl<S> Clone for AttendanceVerifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            window: self.window,
        }
    }
}

impl<S: AttendanceStore> AttendanceVerifier<S> {
    pub fn new(store: Arc<S>, config: VerifierConfig) -> Self {
        let config = config.validated();
        let window = TimeDelta::from_std(config.freshness_window).unwrap_or(TimeDelta::MAX);
        Self {
            store,
            config,
            window,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify a scan received now.
    pub async fn verify_now(
        &self,
        raw_token: &str,
        student_id: &StudentId,
        geolocation: GeoPoint,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.verify(raw_token, student_id, geolocation, Utc::now())
            .await
    }

    /// Verify a scan that reached the server at `received_at`.
    ///
    /// On success the new record is returned. A retried identical request
    /// yields [`AttendanceError::DuplicateAttendance`].
    pub async fn verify(
        &self,
        raw_token: &str,
        student_id: &StudentId,
        geolocation: GeoPoint,
        received_at: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let token = AttendanceToken::decode(raw_token)?;
        let session_id = token.session_id;

        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound(session_id))?;

        if !session.is_active {
            tracing::debug!(%session_id, %student_id, "scan for ended session");
            return Err(AttendanceError::SessionInactive(session_id));
        }

        let age = token.age_at(received_at);
        if age > self.window || age < -self.window {
            tracing::debug!(
                %session_id,
                %student_id,
                age_ms = age.num_milliseconds(),
                "stale token rejected"
            );
            return Err(AttendanceError::TokenExpired {
                age_ms: age.num_milliseconds(),
                window_ms: self.window.num_milliseconds(),
            });
        }

        if !geolocation.is_valid() {
            return Err(AttendanceError::InvalidGeolocation);
        }

        if let Some(radius_m) = self.config.geofence_radius_m {
            let distance = distance_m(geolocation, session.geofence);
            if distance > radius_m {
                // A duplicate outranks OutOfRange.
                let already = self
                    .store
                    .session_attendance(session_id)
                    .await?
                    .iter()
                    .any(|r| &r.student_id == student_id);
                if already {
                    return Err(AttendanceError::DuplicateAttendance {
                        session_id,
                        student_id: student_id.clone(),
                    });
                }
                tracing::info!(%session_id, %student_id, distance_m = distance, "scan outside geofence");
                return Err(AttendanceError::OutOfRange {
                    distance_m: distance,
                    radius_m,
                });
            }
        }

        let record = AttendanceRecord {
            id: RecordId::new(),
            session_id,
            student_id: student_id.clone(),
            institute_id: session.institute_id.clone(),
            subject: session.subject.clone(),
            marked_at: received_at,
            geolocation,
        };

        match self.store.insert_attendance(record.clone()).await {
            Ok(()) => {
                tracing::info!(%session_id, %student_id, "attendance marked");
                Ok(record)
            }
            Err(e @ StoreError::UniqueViolation { .. }) => {
                tracing::debug!(%session_id, %student_id, "duplicate scan");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
