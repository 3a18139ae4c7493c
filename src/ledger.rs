//! Writes attendance events, one row per (student, subject, date).
//!
//! Recording is a two-phase protocol: callers may ask [`check_conflict`] first,
//! then pass an explicit `overwrite` flag to [`record_attendance`]. The upsert
//! itself is the consistency boundary; two writers racing past the existence
//! check both land and the last one wins.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AttendanceError, Result};
use crate::models::{AttendanceEvent, AttendanceKey, AttendanceRequest, RecordOutcome};
use crate::store::{EnrollmentDirectory, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Reject events for subjects the student is not enrolled in.
    pub enforce_enrollment: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            enforce_enrollment: true,
        }
    }
}

pub async fn check_conflict(
    store: &dyn RecordStore,
    key: &AttendanceKey,
) -> Result<Option<AttendanceEvent>> {
    let existing = store.find(key).await?;
    debug!(
        student_id = %key.student_id,
        subject_id = %key.subject_id,
        date = %key.date,
        conflict = existing.is_some(),
        "checked attendance conflict"
    );
    Ok(existing)
}

pub async fn record_attendance(
    store: &dyn RecordStore,
    enrollments: &dyn EnrollmentDirectory,
    policy: LedgerPolicy,
    request: AttendanceRequest,
    overwrite: bool,
) -> Result<RecordOutcome> {
    let today = Utc::now().date_naive();
    if let Err(err) = validate_request(&request, today) {
        warn!(error = %err, "rejected attendance submission");
        return Err(err);
    }

    if policy.enforce_enrollment {
        ensure_enrolled(enrollments, request.student_id, request.subject_id).await?;
    }

    let key = request.key();
    let existing = check_conflict(store, &key).await?;
    if existing.is_some() && !overwrite {
        info!(
            student_id = %key.student_id,
            subject_id = %key.subject_id,
            date = %key.date,
            "attendance already recorded, overwrite declined"
        );
        return Ok(RecordOutcome::Unchanged);
    }

    let event = AttendanceEvent {
        id: existing.as_ref().map_or_else(Uuid::new_v4, |e| e.id),
        student_id: request.student_id,
        subject_id: request.subject_id,
        date: request.date,
        status: request.status,
        notes: normalize_notes(request.notes),
    };
    let stored = store.upsert(event).await?;

    let outcome = if existing.is_some() {
        RecordOutcome::Updated
    } else {
        RecordOutcome::Created
    };
    info!(
        student_id = %stored.student_id,
        subject_id = %stored.subject_id,
        date = %stored.date,
        status = %stored.status,
        ?outcome,
        "attendance recorded"
    );
    Ok(outcome)
}

pub async fn ensure_enrolled(
    enrollments: &dyn EnrollmentDirectory,
    student_id: Uuid,
    subject_id: Uuid,
) -> Result<()> {
    let subjects = enrollments.list_enrolled_subjects(student_id).await?;
    if subjects.iter().any(|subject| subject.id == subject_id) {
        Ok(())
    } else {
        warn!(%student_id, %subject_id, "subject outside enrollment set");
        Err(AttendanceError::NotEnrolled {
            student_id,
            subject_id,
        })
    }
}

pub fn validate_request(request: &AttendanceRequest, today: NaiveDate) -> Result<()> {
    if request.student_id.is_nil() {
        return Err(AttendanceError::Validation("student is required".to_string()));
    }
    if request.subject_id.is_nil() {
        return Err(AttendanceError::Validation("please select a subject".to_string()));
    }
    if request.date > today {
        return Err(AttendanceError::Validation(format!(
            "date {} is in the future",
            request.date
        )));
    }
    Ok(())
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
