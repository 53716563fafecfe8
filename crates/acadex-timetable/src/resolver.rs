//! Period resolution.
//!
//! [`resolve_period`] is the pure core: a day's slots and a minute in, a
//! [`DerivedPeriodState`] out. [`TimetableResolver`] adds the document
//! lookup around it and owns the fail-open policy: a missing or unreadable
//! timetable resolves to Free and never to an error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Weekday};
use tokio::sync::RwLock;

use crate::{
    DerivedPeriodState, MinuteOfDay, PeriodKind, StudentProfile, Timetable, TimetableError,
    TimetableKey, semester_candidates,
};

/// Display subjects for states not backed by a slot.
pub mod subjects {
    /// A timetable exists, but no slot covers the moment.
    pub const NO_ACTIVE_CLASS: &str = "No active class.";
    /// No timetable document for any candidate semester.
    pub const NO_SCHEDULE: &str = "No Schedule Found";
    /// The timetable source failed.
    pub const SCHEDULE_UNAVAILABLE: &str = "Schedule unavailable";
    /// Sunday.
    pub const WEEKEND: &str = "Weekend! Relax.";
}

const FAIL_OPEN_COUNTER: &str = "acadex_timetable_fail_open_total";

/// The slot covering `now`, or Free when none does.
///
/// Deterministic: identical inputs give identical output. When slots
/// overlap, the first in document order wins.
pub fn resolve_period(timetable: &Timetable, now: MinuteOfDay) -> DerivedPeriodState {
    match timetable.slots.iter().find(|s| s.covers(now)) {
        Some(slot) => DerivedPeriodState {
            kind: slot.kind,
            subject: slot
                .subject
                .clone()
                .unwrap_or_else(|| slot.kind.as_str().to_owned()),
            start_time: Some(slot.start_time),
            end_time: Some(slot.end_time),
        },
        None => DerivedPeriodState::free(subjects::NO_ACTIVE_CLASS),
    }
}

/// Read access to timetable documents.
pub trait TimetableSource: Send + Sync + 'static {
    fn timetable(
        &self,
        key: &TimetableKey,
    ) -> impl Future<Output = Result<Option<Timetable>, TimetableError>> + Send;
}

/// Timetables held in memory, keyed by the document key string.
#[derive(Debug, Default)]
pub struct MemoryTimetable {
    docs: RwLock<HashMap<String, Timetable>>,
}

impl MemoryTimetable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: &TimetableKey, timetable: Timetable) {
        self.docs.write().await.insert(key.to_string(), timetable);
    }

    pub async fn remove(&self, key: &TimetableKey) -> Option<Timetable> {
        self.docs.write().await.remove(&key.to_string())
    }
}

impl TimetableSource for MemoryTimetable {
    async fn timetable(&self, key: &TimetableKey) -> Result<Option<Timetable>, TimetableError> {
        Ok(self.docs.read().await.get(&key.to_string()).cloned())
    }
}

/// Resolves the current period for a student.
pub struct TimetableResolver<T> {
    source: Arc<T>,
}

impl<T> Clone for TimetableResolver<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T: TimetableSource> TimetableResolver<T> {
    pub fn new(source: Arc<T>) -> Self {
        Self { source }
    }

    /// Resolve for a local date-time.
    pub async fn resolve_at(&self, profile: &StudentProfile, at: NaiveDateTime) -> DerivedPeriodState {
        self.resolve(profile, at.weekday(), MinuteOfDay::from_time(at.time()))
            .await
    }

    /// Resolve for `weekday` at `now`.
    ///
    /// Sunday is a holiday without a lookup. Otherwise the first semester
    /// candidate with a document for the day decides.
    pub async fn resolve(
        &self,
        profile: &StudentProfile,
        weekday: Weekday,
        now: MinuteOfDay,
    ) -> DerivedPeriodState {
        if weekday == Weekday::Sun {
            return DerivedPeriodState {
                kind: PeriodKind::Holiday,
                subject: subjects::WEEKEND.to_owned(),
                start_time: None,
                end_time: None,
            };
        }

        for semester in semester_candidates(&profile.year, profile.semester) {
            let key = TimetableKey {
                department: profile.department.clone(),
                semester,
                weekday,
            };
            match self.source.timetable(&key).await {
                Ok(Some(timetable)) => return resolve_period(&timetable, now),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "timetable source failed, failing open to Free");
                    metrics::counter!(FAIL_OPEN_COUNTER, "reason" => "source_error").increment(1);
                    return DerivedPeriodState::free(subjects::SCHEDULE_UNAVAILABLE);
                }
            }
        }

        tracing::warn!(
            department = %profile.department,
            year = %profile.year,
            ?weekday,
            "no timetable document, failing open to Free"
        );
        metrics::counter!(FAIL_OPEN_COUNTER, "reason" => "missing").increment(1);
        DerivedPeriodState::free(subjects::NO_SCHEDULE)
    }
}
