//! Rotating display tokens for live sessions.
//!
//! Each started session gets a [`RotatingTokenGenerator`]. The rotation is
//! bound to the session's lifetime through the feed hub: it stops on the
//! `Removed` event for the session on its institute topic, which covers both
//! an explicit end and a supersede.

use std::collections::HashMap;
use std::future::Future;

use acadex_attendance::{RotatingTokenGenerator, RotationConfig, RotationHandle};
use acadex_feed::{FeedError, FeedHub, Subscription};
use acadex_protocol::{AttendanceToken, Change, FeedItem, Session, SessionId, Topic};
use tokio::sync::Mutex;

/// Rotations for the sessions currently on display.
pub struct TokenDisplay {
    hub: FeedHub,
    config: RotationConfig,
    rotations: Mutex<HashMap<SessionId, RotationHandle>>,
}

impl TokenDisplay {
    pub fn new(hub: FeedHub, config: RotationConfig) -> Self {
        Self {
            hub,
            config,
            rotations: Mutex::new(HashMap::new()),
        }
    }

    /// Start rotating tokens for `session` and return the first one.
    pub async fn start(&self, session: &Session) -> Result<AttendanceToken, FeedError> {
        let subscription = self
            .hub
            .subscribe(Topic::ActiveSession {
                institute_id: session.institute_id.clone(),
            })
            .await?;

        let handle = RotatingTokenGenerator::new(session.id)
            .spawn(self.config.clone(), session_ended(subscription, session.id));
        let token = handle.current();

        let mut rotations = self.rotations.lock().await;
        rotations.retain(|_, h| !h.is_finished());
        rotations.insert(session.id, handle);
        tracing::debug!(session_id = %session.id, live = rotations.len(), "display rotation registered");
        Ok(token)
    }

    /// The token that should be on screen now, `None` once the session
    /// stopped rotating.
    pub async fn current(&self, session_id: SessionId) -> Option<AttendanceToken> {
        let mut rotations = self.rotations.lock().await;
        rotations.retain(|_, h| !h.is_finished());
        rotations.get(&session_id).map(RotationHandle::current)
    }

    pub fn cadence(&self) -> std::time::Duration {
        self.config.cadence
    }
}

/// Resolves when `session_id` leaves its institute's active slot.
///
/// The snapshot is already queued when `subscribe` returns. A session
/// missing from it ended before the subscription existed.
fn session_ended(
    mut subscription: Subscription,
    session_id: SessionId,
) -> impl Future<Output = ()> + Send + 'static {
    let mut live = false;
    while let Some(event) = subscription.try_recv() {
        if let Change::Added(FeedItem::Session(s)) = &event.change {
            live |= s.id == session_id;
        }
    }

    async move {
        if !live {
            return;
        }
        while let Some(event) = subscription.recv().await {
            if let Change::Removed(FeedItem::Session(s)) = &event.change {
                if s.id == session_id {
                    return;
                }
            }
        }
        // hub stopped
    }
}
