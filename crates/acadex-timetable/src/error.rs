//! Error types for timetable handling.

#[derive(Debug, Clone, thiserror::Error)]
pub enum TimetableError {
    /// A slot time was not `HH:MM` within one day.
    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),

    /// The timetable source could not be read.
    #[error("timetable source unavailable: {0}")]
    Source(String),
}
