//! The rotating attendance token.
//!
//! A token is derived, never persisted: `{session_id}|{issued_at_millis}`.
//! It is verified purely by freshness against the server's receipt time.
//! There is no signature. The threat it addresses is a stale screenshot
//! being replayed after the display has rotated, not a live relay of the
//! current code by a colluding student; stopping a relay needs device
//! attestation, which this subsystem does not attempt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{ProtocolError, SessionId};

const SEPARATOR: char = '|';

/// A scannable token identifying a session at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceToken {
    pub session_id: SessionId,
    /// Millisecond precision; finer precision is lost on the wire.
    pub issued_at: DateTime<Utc>,
}

impl AttendanceToken {
    /// Creates a token, truncating `issued_at` to whole milliseconds so that
    /// `decode(encode(t)) == t`.
    pub fn new(session_id: SessionId, issued_at: DateTime<Utc>) -> Self {
        let millis = issued_at.timestamp_millis();
        let issued_at = DateTime::from_timestamp_millis(millis).unwrap_or(issued_at);
        Self {
            session_id,
            issued_at,
        }
    }

    /// Renders the opaque string placed in the QR code.
    pub fn encode(&self) -> String {
        format!(
            "{}{SEPARATOR}{}",
            self.session_id,
            self.issued_at.timestamp_millis()
        )
    }

    /// Parses a scanned string.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedToken`] if the separator, the session id,
    /// or the timestamp is missing or unparseable.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let raw = raw.trim();
        let (session, issued) = raw
            .split_once(SEPARATOR)
            .ok_or_else(|| ProtocolError::MalformedToken("missing separator".into()))?;

        let session_id: SessionId = session
            .parse()
            .map_err(|e| ProtocolError::MalformedToken(format!("session id: {e}")))?;

        let millis: i64 = issued
            .parse()
            .map_err(|e| ProtocolError::MalformedToken(format!("issued_at: {e}")))?;

        let issued_at = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| ProtocolError::MalformedToken("issued_at out of range".into()))?;

        Ok(Self {
            session_id,
            issued_at,
        })
    }

    /// How old the token is when received at `received_at`.
    ///
    /// Negative when the issuing clock runs ahead of the receiver.
    pub fn age_at(&self, received_at: DateTime<Utc>) -> TimeDelta {
        received_at - self.issued_at
    }
}

impl fmt::Display for AttendanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for AttendanceToken {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
