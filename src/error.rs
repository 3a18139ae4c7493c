use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Malformed input: missing identifiers, future dates, out-of-range percentages.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("student {student_id} is not enrolled in subject {subject_id}")]
    NotEnrolled { student_id: Uuid, subject_id: Uuid },

    /// The record store was unreachable or rejected the operation.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AttendanceError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AttendanceError::Validation(_) | AttendanceError::NotEnrolled { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
