//! Live attendance for Acadex.
//!
//! - [`RotatingTokenGenerator`] runs on the teacher's display and produces a
//!   fresh [`AttendanceToken`](acadex_protocol::AttendanceToken) every
//!   cadence while the session is live.
//! - [`AttendanceVerifier`] is the authoritative accept/reject decision for
//!   a scan and the only code path that creates an attendance record.
//! - [`acquire_location`] bounds how long anyone waits for a device fix.
//! - [`AttendanceSummary`] turns a student's record count into a
//!   percentage and a standing.

#![allow(async_fn_in_trait)]

mod error;
mod geo;
mod location;
mod rotation;
mod summary;
mod verifier;

pub use error::AttendanceError;
pub use geo::{EARTH_RADIUS_M, distance_m};
pub use location::{FixedLocation, LocationProvider, acquire_location};
pub use rotation::{RotatingTokenGenerator, RotationConfig, RotationHandle};
pub use summary::{AttendanceSummary, Standing, student_summary};
pub use verifier::{AttendanceVerifier, VerifierConfig};
