//! Timetable documents and derived period state.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::TimetableError;

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// Minutes since local midnight, `0..1440`.
///
/// All slot comparisons happen in this unit. Serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub const MIDNIGHT: Self = Self(0);
    /// One past the last minute; valid only as an exclusive slot end.
    pub const END_OF_DAY: Self = Self(24 * 60);

    pub fn new(hour: u16, minute: u16) -> Result<Self, TimetableError> {
        let m = hour.checked_mul(60).and_then(|h| h.checked_add(minute));
        match m {
            Some(m) if minute < 60 && m <= Self::END_OF_DAY.0 => Ok(Self(m)),
            _ => Err(TimetableError::InvalidTime(format!("{hour:02}:{minute:02}"))),
        }
    }

    pub fn from_time(t: NaiveTime) -> Self {
        Self((t.hour() * 60 + t.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl FromStr for MinuteOfDay {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TimetableError::InvalidTime(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let hour: u16 = h.parse().map_err(|_| bad())?;
        let minute: u16 = m.parse().map_err(|_| bad())?;
        Self::new(hour, minute).map_err(|_| bad())
    }
}

impl TryFrom<String> for MinuteOfDay {
    type Error = TimetableError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MinuteOfDay> for String {
    fn from(m: MinuteOfDay) -> Self {
        m.to_string()
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

// ---------------------------------------------------------------------------
// Period kind
// ---------------------------------------------------------------------------

/// What a slot (or the current moment) is.
///
/// Parsed case-insensitively from the document's `type` field; anything
/// that is not free, break, or holiday is a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeriodKind {
    Class,
    Free,
    Break,
    Holiday,
}

impl PeriodKind {
    /// Breaks and holidays count as free for gating.
    pub fn is_free(self) -> bool {
        !matches!(self, Self::Class)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::Free => "Free",
            Self::Break => "Break",
            Self::Holiday => "Holiday",
        }
    }
}

impl From<&str> for PeriodKind {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Self::Free,
            "break" => Self::Break,
            "holiday" => Self::Holiday,
            _ => Self::Class,
        }
    }
}

impl From<String> for PeriodKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PeriodKind> for String {
    fn from(k: PeriodKind) -> Self {
        k.as_str().to_owned()
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// One row of a day's timetable. Covers `[start_time, end_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub start_time: MinuteOfDay,
    pub end_time: MinuteOfDay,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "type")]
    pub kind: PeriodKind,
}

impl TimetableSlot {
    pub fn covers(&self, now: MinuteOfDay) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

/// A day's timetable for one department and semester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub slots: Vec<TimetableSlot>,
}

/// Where a timetable document lives: `{department}_Sem{semester}_{Weekday}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimetableKey {
    pub department: String,
    pub semester: u8,
    pub weekday: Weekday,
}

impl fmt::Display for TimetableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_Sem{}_{}",
            self.department,
            self.semester,
            weekday_name(self.weekday)
        )
    }
}

fn weekday_name(d: Weekday) -> &'static str {
    match d {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

/// The parts of a student profile that select a timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub department: String,
    /// Declared year of study: `FE`, `SE`, `TE`, or `BE`.
    pub year: String,
    /// Explicit semester, overriding the year mapping.
    pub semester: Option<u8>,
}

/// Semesters to try, in order, for a student.
pub fn semester_candidates(year: &str, explicit: Option<u8>) -> Vec<u8> {
    if let Some(sem) = explicit {
        return vec![sem];
    }
    match year.trim().to_ascii_uppercase().as_str() {
        "FE" => vec![1, 2],
        "SE" => vec![3, 4],
        "TE" => vec![5, 6],
        _ => vec![7, 8],
    }
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

/// What is happening right now. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedPeriodState {
    #[serde(rename = "type")]
    pub kind: PeriodKind,
    pub subject: String,
    /// Absent when no slot covers the moment.
    pub start_time: Option<MinuteOfDay>,
    pub end_time: Option<MinuteOfDay>,
}

impl DerivedPeriodState {
    /// A Free state not backed by any slot.
    pub fn free(subject: &str) -> Self {
        Self {
            kind: PeriodKind::Free,
            subject: subject.to_owned(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind.is_free()
    }
}
