//! Wire protocol and shared data model for Acadex.
//!
//! This crate defines the "language" every other layer speaks:
//!
//! - **Model** ([`Session`], [`AttendanceRecord`], [`GeoPoint`] and the
//!   identifier newtypes): the records the authoritative store owns.
//! - **Token** ([`AttendanceToken`]): the short-lived scannable string shown
//!   while a session is live.
//! - **Feed** ([`Envelope`], [`FeedMessage`], [`FeedEvent`], [`Topic`]):
//!   the push-subscription messages dashboards receive.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages become
//!   bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Feed / Session layers
//! ```

mod codec;
mod error;
mod token;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{ErrorClass, ProtocolError};
pub use token::AttendanceToken;
pub use types::{
    AttendanceRecord, Change, Envelope, FeedEvent, FeedItem, FeedMessage,
    GeoPoint, InstituteId, RecordId, Role, Session, SessionId, StudentId,
    TeacherId, Topic,
};

/// Version clients must send in their feed handshake.
pub const PROTOCOL_VERSION: u32 = 1;
