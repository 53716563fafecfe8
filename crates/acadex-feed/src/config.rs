//! Feed hub configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`FeedHub`](crate::FeedHub).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Bound on queued subscribe/unsubscribe commands. Callers wait when
    /// it is full.
    pub command_channel_size: usize,

    /// Maximum concurrent subscribers on one topic.
    pub max_subscribers_per_topic: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 256,
            max_subscribers_per_topic: 512,
        }
    }
}

impl FeedConfig {
    pub fn validated(mut self) -> Self {
        if self.command_channel_size == 0 {
            tracing::warn!("feed command_channel_size of 0 is invalid, using 1");
            self.command_channel_size = 1;
        }
        if self.max_subscribers_per_topic == 0 {
            tracing::warn!("feed max_subscribers_per_topic of 0 is invalid, using 1");
            self.max_subscribers_per_topic = 1;
        }
        self
    }
}
