//! Token rotation on the teacher's display.
//!
//! While a session is live the display shows a QR code that must change
//! every cadence. A screenshot taken now is worthless once the freshness
//! window has passed. Rotation never touches the store: a token is derived
//! from the session id and the clock.

use std::future::Future;
use std::time::Duration;

use acadex_protocol::{AttendanceToken, SessionId};
use acadex_tick::{Cadence, CadenceConfig, MissedTickPolicy};
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Configuration for [`RotatingTokenGenerator::spawn`].
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// How often a new token is issued.
    pub cadence: Duration,
    /// Upper bound of the random delay added to the first rotation, so
    /// displays started together do not rotate in lockstep.
    pub jitter: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(10),
            jitter: Duration::ZERO,
        }
    }
}

impl RotationConfig {
    /// Jitter stretches the first token's time on screen, so it is capped
    /// at half a cadence.
    pub fn validated(mut self) -> Self {
        let max = self.cadence / 2;
        if self.jitter > max {
            tracing::warn!(
                jitter_ms = self.jitter.as_millis() as u64,
                max_ms = max.as_millis() as u64,
                "rotation jitter above half the cadence, clamping"
            );
            self.jitter = max;
        }
        self
    }
}

/// Produces tokens for one session.
#[derive(Debug, Clone, Copy)]
pub struct RotatingTokenGenerator {
    session_id: SessionId,
}

impl RotatingTokenGenerator {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// A token issued now.
    pub fn tick(&self) -> AttendanceToken {
        AttendanceToken::new(self.session_id, Utc::now())
    }

    /// Rotate in the background until `session_ended` resolves.
    ///
    /// The first token is available immediately. Stale rotations are
    /// skipped rather than replayed: a late tick issues one token for now.
    pub fn spawn<F>(self, config: RotationConfig, session_ended: F) -> RotationHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = config.validated();
        let (tx, rx) = watch::channel(self.tick());
        let session_id = self.session_id;

        let task = tokio::spawn(async move {
            let mut cadence = Cadence::new(
                CadenceConfig::every(config.cadence)
                    .with_policy(MissedTickPolicy::Skip)
                    .with_jitter(config.jitter),
            );
            tokio::pin!(session_ended);
            loop {
                tokio::select! {
                    _ = &mut session_ended => {
                        tracing::debug!(%session_id, "session ended, token rotation stopped");
                        break;
                    }
                    info = cadence.wait_for_tick() => {
                        let token = self.tick();
                        tracing::trace!(%session_id, tick = info.tick, "token rotated");
                        if tx.send(token).is_err() {
                            // every receiver (including the handle's) is gone
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!(%session_id, cadence_ms = config.cadence.as_millis() as u64, "token rotation started");
        RotationHandle { rx, task }
    }
}

/// Handle to a running rotation. Dropping it stops the rotation.
pub struct RotationHandle {
    rx: watch::Receiver<AttendanceToken>,
    task: JoinHandle<()>,
}

impl RotationHandle {
    /// The token that should be on screen right now.
    pub fn current(&self) -> AttendanceToken {
        *self.rx.borrow()
    }

    /// A receiver for rendering loops. `changed()` fires on each rotation
    /// and errors once the rotation has stopped.
    pub fn subscribe(&self) -> watch::Receiver<AttendanceToken> {
        self.rx.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    /// `true` once the session ended or [`stop`](Self::stop) was called.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
