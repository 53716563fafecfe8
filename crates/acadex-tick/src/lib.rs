//! Cadence scheduler for Acadex background loops.
//!
//! Two loops in the system run on a wall-clock cadence rather than in
//! response to requests: the attendance token rotation on the teacher's
//! display (every 10 s) and the timetable re-check on the student's device
//! (every 60 s). Both need the same things: a fixed interval, a sane answer
//! when a tick is late, and a way to stop cleanly when their owner goes
//! away.
//!
//! [`Cadence`] is the low-level primitive and sits inside a `tokio::select!`
//! loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = &mut shutdown => break,
//!         info = cadence.wait_for_tick() => rotate(info.tick),
//!     }
//! }
//! ```
//!
//! [`PeriodicTask`] wraps that loop in a spawned task with a stop handle.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissedTickPolicy {
    /// Stay on the original grid and drop the ticks that were missed.
    #[default]
    Skip,
    /// Restart the grid from the moment the late tick fired.
    Delay,
}

/// Configuration for a [`Cadence`].
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    /// Time between ticks.
    pub interval: Duration,
    pub policy: MissedTickPolicy,
    /// Random delay (0..max) added to the first tick so that many loops
    /// started together do not fire in lockstep.
    pub initial_jitter: Duration,
    /// Fire the first tick immediately instead of after one interval.
    pub fire_immediately: bool,
}

impl CadenceConfig {
    /// Shortest interval accepted; anything below is clamped.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            policy: MissedTickPolicy::default(),
            initial_jitter: Duration::ZERO,
            fire_immediately: false,
        }
    }

    /// Builder: fire the first tick at once.
    pub fn immediately(mut self) -> Self {
        self.fire_immediately = true;
        self
    }

    /// Builder: set the missed-tick policy.
    pub fn with_policy(mut self, policy: MissedTickPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder: set the first-tick jitter.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Clamp out-of-range values. Called by [`Cadence::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "cadence interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if the tick fired more than a tenth of an interval late.
    pub overrun: bool,
    /// Ticks dropped under [`MissedTickPolicy::Skip`].
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// A fixed-interval tick source.
pub struct Cadence {
    config: CadenceConfig,
    tick_count: u64,
    next_tick: Instant,
}

impl Cadence {
    pub fn new(config: CadenceConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max))
        };
        let first = if config.fire_immediately {
            Duration::ZERO
        } else {
            config.interval
        };
        let next_tick = Instant::now() + first + jitter;

        debug!(
            interval_ms = config.interval.as_millis() as u64,
            policy = ?config.policy,
            "cadence created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
        }
    }

    /// Wait for the next tick. Cancel-safe: dropping the future before it
    /// resolves leaves the grid untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = Instant::now();
        let interval = self.config.interval;
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            MissedTickPolicy::Skip => {
                ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                if ticks_skipped > 0 {
                    warn!(
                        tick = self.tick_count,
                        skipped = ticks_skipped,
                        late_ms = late_by.as_millis() as u64,
                        "cadence fell behind, skipping missed ticks"
                    );
                }
                due + interval * (ticks_skipped as u32 + 1)
            }
            MissedTickPolicy::Delay => {
                if overrun {
                    debug!(
                        tick = self.tick_count,
                        late_ms = late_by.as_millis() as u64,
                        "cadence late, delaying grid"
                    );
                }
                now + interval
            }
        };

        trace!(tick = self.tick_count, overrun, "cadence tick");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// PeriodicTask
// ---------------------------------------------------------------------------

/// A spawned loop that runs a callback on every tick of a [`Cadence`].
///
/// The callback returns [`ControlFlow::Break`] to end the loop itself.
/// Dropping the handle (or calling [`stop`](Self::stop)) aborts the task,
/// so a task never outlives its owner.
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `f` onto the current runtime, driven by `config`.
    pub fn spawn<F, Fut>(name: &'static str, config: CadenceConfig, mut f: F) -> Self
    where
        F: FnMut(TickInfo) -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut cadence = Cadence::new(config);
            loop {
                let info = cadence.wait_for_tick().await;
                if f(info).await.is_break() {
                    debug!(task = name, tick = info.tick, "periodic task finished");
                    break;
                }
            }
        });
        debug!(task = name, "periodic task started");
        Self { name, handle }
    }

    /// Abort the loop. Idempotent.
    pub fn stop(&self) {
        if !self.handle.is_finished() {
            debug!(task = self.name, "periodic task stopped");
        }
        self.handle.abort();
    }

    /// `true` once the loop has ended, by itself or via [`stop`](Self::stop).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
