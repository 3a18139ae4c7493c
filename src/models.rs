use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttendanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            other => Err(AttendanceError::Validation(format!(
                "unknown attendance status '{other}'"
            ))),
        }
    }
}

/// The (student, subject, date) triple. At most one event exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttendanceKey {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

impl AttendanceEvent {
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            student_id: self.student_id,
            subject_id: self.subject_id,
            date: self.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

/// One submission from the recording flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRequest {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

impl AttendanceRequest {
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            student_id: self.student_id,
            subject_id: self.subject_id,
            date: self.date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOutcome {
    Created,
    Updated,
    /// An existing record was found and the caller declined to overwrite it.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub subject_code: String,
    pub classes_attended: u32,
    pub total_classes: u32,
    pub attendance_percentage: f64,
}

impl AttendanceSummary {
    /// Unrounded attended/total ratio. Tiers and ordering use this value;
    /// `attendance_percentage` is the two-decimal display form.
    pub fn exact_percentage(&self) -> f64 {
        crate::aggregate::percentage(self.classes_attended, self.total_classes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub present_count: u32,
    pub absent_count: u32,
    pub late_count: u32,
    pub total_count: u32,
    pub daily_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskTier {
    Good,
    Warning,
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Good => "Good",
            RiskTier::Warning => "Warning",
            RiskTier::Critical => "Critical",
        };
        f.write_str(label)
    }
}
