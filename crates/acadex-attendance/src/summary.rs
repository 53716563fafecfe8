//! Per-student attendance percentage.

use acadex_protocol::{InstituteId, StudentId};
use acadex_session::{AttendanceStore, StoreError};
use serde::{Deserialize, Serialize};

/// Where a percentage sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    /// 75 % or more.
    Good,
    /// 60 % up to 75 %.
    AtRisk,
    Critical,
}

impl Standing {
    pub fn from_percentage(pct: u8) -> Self {
        match pct {
            75.. => Self::Good,
            60..=74 => Self::AtRisk,
            _ => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub attended: u64,
    /// Sessions started for the student's department.
    pub total: u64,
    /// Rounded, capped at 100. Zero when no class has been held.
    pub percentage: u8,
    pub standing: Standing,
}

impl AttendanceSummary {
    pub fn compute(attended: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            let pct = (attended as f64 / total as f64 * 100.0).round();
            pct.min(100.0) as u8
        };
        Self {
            attended,
            total,
            percentage,
            standing: Standing::from_percentage(percentage),
        }
    }
}

/// Summary for `student_id` against the class count of `department`.
pub async fn student_summary<S: AttendanceStore>(
    store: &S,
    institute_id: &InstituteId,
    student_id: &StudentId,
    department: &str,
) -> Result<AttendanceSummary, StoreError> {
    let attended = store
        .student_attendance(institute_id, student_id, None)
        .await?
        .len() as u64;
    let total = store.class_count(institute_id, department).await?;
    Ok(AttendanceSummary::compute(attended, total))
}
