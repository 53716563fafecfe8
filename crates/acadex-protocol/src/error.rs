//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A scanned attendance token could not be decoded.
    #[error("malformed attendance token: {0}")]
    MalformedToken(String),
}

/// How a failure should be treated by whoever receives it.
///
/// Every error type in the workspace maps onto one of these through a
/// `class()` method, and the HTTP layer picks status codes from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The request can never succeed as sent (no geolocation, bad token,
    /// unauthenticated). Surface immediately, never retry.
    Precondition,
    /// The user's intent is already satisfied (duplicate scan, session
    /// already ended). Informational rather than a hard failure.
    Conflict,
    /// Store or network unavailable. Safe to retry with backoff.
    Transient,
    /// A uniqueness guarantee was observed broken. Logged as a critical
    /// defect.
    InvariantViolation,
}

impl ErrorClass {
    /// Whether a caller may retry the same request.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Precondition
    }
}
