//! Timetable-driven period state for Acadex.
//!
//! Answers "what is happening for this student right now?" from static
//! timetable documents, and turns changes in that answer into unlock/lock
//! signals for free-period activities.
//!
//! ```text
//! ScheduleWatcher (every minute)
//!     │  TimetableResolver::resolve  → DerivedPeriodState
//!     ▼
//! FreePeriodGate::observe            → Some(GateSignal) on an edge
//! ```
//!
//! Missing data never blocks anything: no document, or a source that
//! errors, resolves to Free.

#![allow(async_fn_in_trait)]

mod error;
mod gate;
mod model;
mod resolver;
mod watcher;

pub use error::TimetableError;
pub use gate::{FreePeriodGate, GateSignal, GateState};
pub use model::{
    DerivedPeriodState, MinuteOfDay, PeriodKind, StudentProfile, Timetable, TimetableKey,
    TimetableSlot, semester_candidates,
};
pub use resolver::{
    MemoryTimetable, TimetableResolver, TimetableSource, resolve_period, subjects,
};
pub use watcher::{ScheduleWatcher, WatcherConfig};
