//! # Acadex
//!
//! Live attendance verification for institutes.
//!
//! A teacher starts a broadcast session, the classroom display shows a
//! rotating token, and students scan it from inside the geofence. Dashboards
//! follow the active session and the live roster over push feeds.
//!
//! This crate is the service: the HTTP API, the push-feed connection
//! handler, configuration, and the [`AcadexServer`] that ties the layers
//! together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use acadex::prelude::*;
//!
//! # async fn run() -> Result<(), AcadexError> {
//! let config = AppConfig::load()?;
//! let auth = config.auth.static_authenticator();
//! let server = AcadexServerBuilder::new()
//!     .config(config)
//!     .build(Arc::new(MemoryStore::new()), auth, Arc::new(MemoryTimetable::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod display;
mod error;
mod handler;
pub mod routes;
mod server;
mod telemetry;

pub use error::{AcadexError, ApiError};
pub use server::{AcadexServer, AcadexServerBuilder};
pub use telemetry::init_tracing;

/// The types most applications need.
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::{AcadexError, AcadexServer, AcadexServerBuilder, ApiError};
    pub use acadex_attendance::{AttendanceError, AttendanceVerifier, VerifierConfig};
    pub use acadex_feed::{FeedConfig, FeedHub, Subscription};
    pub use acadex_protocol::{
        AttendanceRecord, AttendanceToken, Change, FeedEvent, FeedItem, GeoPoint, InstituteId,
        Role, Session, SessionId, StudentId, TeacherId, Topic,
    };
    pub use acadex_session::{
        AttendanceStore, Authenticator, Identity, MemoryStore, SessionError, SessionRegistry,
        StaticAuthenticator,
    };
    pub use acadex_timetable::{MemoryTimetable, TimetableResolver, TimetableSource};
}
