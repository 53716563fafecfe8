//! Periodic re-evaluation of a student's period state.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use acadex_tick::{CadenceConfig, MissedTickPolicy, PeriodicTask};
use chrono::NaiveDateTime;
use tokio::sync::{Mutex, mpsc, watch};

use crate::{
    DerivedPeriodState, FreePeriodGate, GateSignal, StudentProfile, TimetableResolver,
    TimetableSource,
};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How often the period is re-resolved. At most a minute, or a class
    /// boundary can be missed for longer than one slot granularity.
    pub recheck: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            recheck: Duration::from_secs(60),
        }
    }
}

impl WatcherConfig {
    pub fn validated(mut self) -> Self {
        let max = Duration::from_secs(60);
        if self.recheck > max {
            tracing::warn!(
                recheck_secs = self.recheck.as_secs(),
                "timetable recheck slower than once a minute, clamping"
            );
            self.recheck = max;
        }
        self
    }
}

/// Re-resolves a student's period on a cadence and feeds a
/// [`FreePeriodGate`].
///
/// The first evaluation runs immediately. The latest state is on a `watch`
/// channel; gate edges arrive on [`next_signal`](Self::next_signal).
/// Dropping the watcher stops it.
pub struct ScheduleWatcher {
    state: watch::Receiver<Option<DerivedPeriodState>>,
    signals: mpsc::UnboundedReceiver<GateSignal>,
    task: PeriodicTask,
}

impl ScheduleWatcher {
    /// Spawn with an explicit local clock.
    pub fn spawn<T, C>(
        resolver: TimetableResolver<T>,
        profile: StudentProfile,
        config: WatcherConfig,
        clock: C,
    ) -> Self
    where
        T: TimetableSource,
        C: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        let config = config.validated();
        let (state_tx, state_rx) = watch::channel(None);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let state_tx = Arc::new(state_tx);
        let clock = Arc::new(clock);
        let gate = Arc::new(Mutex::new(FreePeriodGate::new()));

        let cadence = CadenceConfig::every(config.recheck)
            .immediately()
            .with_policy(MissedTickPolicy::Delay);

        let task = PeriodicTask::spawn("schedule-watcher", cadence, move |_| {
            let resolver = resolver.clone();
            let profile = profile.clone();
            let clock = Arc::clone(&clock);
            let gate = Arc::clone(&gate);
            let state_tx = Arc::clone(&state_tx);
            let signal_tx = signal_tx.clone();
            async move {
                let state = resolver.resolve_at(&profile, (*clock)()).await;
                let signal = gate.lock().await.observe(state.kind);
                tracing::trace!(kind = %state.kind, subject = %state.subject, "period resolved");
                state_tx.send_replace(Some(state));

                if let Some(signal) = signal {
                    tracing::info!(?signal, department = %profile.department, "free period gate changed");
                    if signal_tx.send(signal).is_err() {
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            }
        });

        Self {
            state: state_rx,
            signals: signal_rx,
            task,
        }
    }

    /// Spawn against the machine's local time.
    pub fn spawn_local<T: TimetableSource>(
        resolver: TimetableResolver<T>,
        profile: StudentProfile,
        config: WatcherConfig,
    ) -> Self {
        Self::spawn(resolver, profile, config, || {
            chrono::Local::now().naive_local()
        })
    }

    /// The most recent state, `None` before the first evaluation.
    pub fn current(&self) -> Option<DerivedPeriodState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DerivedPeriodState>> {
        self.state.clone()
    }

    /// The next gate edge. `None` once the watcher has stopped.
    pub async fn next_signal(&mut self) -> Option<GateSignal> {
        self.signals.recv().await
    }

    pub fn stop(&self) {
        self.task.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
