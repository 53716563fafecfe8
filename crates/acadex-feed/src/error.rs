//! Error types for the feed layer.

use acadex_protocol::{ErrorClass, Topic};
use acadex_session::StoreError;

/// Errors that can occur during feed operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The topic already has the maximum number of subscribers.
    #[error("topic {0} is full")]
    TopicFull(Topic),

    /// The hub's command channel is closed (hub shut down).
    #[error("feed hub is unavailable")]
    Unavailable,

    /// The snapshot for a new subscription could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FeedError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TopicFull(_) | Self::Unavailable => ErrorClass::Transient,
            Self::Store(e) => e.class(),
        }
    }
}
