//! Geolocation acquisition with a hard timeout.
//!
//! Both starting a class and checking in need a position fix. A device that
//! never answers must not hang either flow, so every acquisition is bounded
//! and a miss becomes [`AttendanceError::LocationUnavailable`]. That error is
//! a precondition failure and is never retried automatically.

use std::future::Future;
use std::time::Duration;

use acadex_protocol::GeoPoint;

use crate::AttendanceError;

/// A source of the device's current position (GPS, browser bridge, ...).
pub trait LocationProvider: Send + Sync {
    fn current_position(&self) -> impl Future<Output = Result<GeoPoint, AttendanceError>> + Send;
}

/// Always reports the same point. For development and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub GeoPoint);

impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<GeoPoint, AttendanceError> {
        Ok(self.0)
    }
}

/// Ask `provider` for a fix, giving up after `timeout`.
///
/// # Errors
/// [`AttendanceError::LocationUnavailable`] on timeout, provider failure, or
/// an out-of-range coordinate.
pub async fn acquire_location<P: LocationProvider>(
    provider: &P,
    timeout: Duration,
) -> Result<GeoPoint, AttendanceError> {
    let point = match tokio::time::timeout(timeout, provider.current_position()).await {
        Ok(Ok(point)) => point,
        Ok(Err(AttendanceError::LocationUnavailable(reason))) => {
            tracing::info!(%reason, "location provider refused");
            return Err(AttendanceError::LocationUnavailable(reason));
        }
        Ok(Err(other)) => {
            return Err(AttendanceError::LocationUnavailable(other.to_string()));
        }
        Err(_) => {
            tracing::info!(timeout_ms = timeout.as_millis() as u64, "location fix timed out");
            return Err(AttendanceError::LocationUnavailable(format!(
                "no fix within {}s",
                timeout.as_secs()
            )));
        }
    };

    if !point.is_valid() {
        return Err(AttendanceError::LocationUnavailable(format!(
            "provider returned invalid point {point}"
        )));
    }
    Ok(point)
}
