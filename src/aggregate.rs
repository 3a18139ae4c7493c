use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AttendanceEvent, AttendanceStatus, AttendanceSummary, Subject};
use crate::store::{EnrollmentDirectory, RecordStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryOrder {
    /// Same order as the enrollment directory lists subjects.
    #[default]
    Enrollment,
    /// Lowest percentage first, so at-risk subjects surface at the top.
    RiskFirst,
}

pub async fn summarize(
    store: &dyn RecordStore,
    enrollments: &dyn EnrollmentDirectory,
    student_id: Uuid,
    order: SummaryOrder,
) -> Result<Vec<AttendanceSummary>> {
    let subjects = enrollments.list_enrolled_subjects(student_id).await?;
    let events = store.query_by_student(student_id).await?;
    debug!(
        %student_id,
        subjects = subjects.len(),
        events = events.len(),
        "summarizing attendance"
    );

    let mut summaries = summarize_events(&subjects, &events);
    sort_summaries(&mut summaries, order);
    Ok(summaries)
}

/// One summary per subject. Events for subjects not in `subjects` are ignored.
pub fn summarize_events(
    subjects: &[Subject],
    events: &[AttendanceEvent],
) -> Vec<AttendanceSummary> {
    let mut tallies: HashMap<Uuid, (u32, u32)> = HashMap::new();
    for event in events {
        let entry = tallies.entry(event.subject_id).or_insert((0, 0));
        if event.status == AttendanceStatus::Present {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    subjects
        .iter()
        .map(|subject| {
            let (attended, total) = tallies.get(&subject.id).copied().unwrap_or((0, 0));
            AttendanceSummary {
                subject_id: subject.id,
                subject_name: subject.name.clone(),
                subject_code: subject.code.clone(),
                classes_attended: attended,
                total_classes: total,
                attendance_percentage: round2(percentage(attended, total)),
            }
        })
        .collect()
}

pub fn sort_summaries(summaries: &mut [AttendanceSummary], order: SummaryOrder) {
    if order == SummaryOrder::RiskFirst {
        summaries.sort_by(|a, b| {
            a.exact_percentage()
                .partial_cmp(&b.exact_percentage())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.subject_name.cmp(&b.subject_name))
        });
    }
}

/// `part / total * 100`, defined as 0 when there is nothing to divide by.
pub fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{record_attendance, LedgerPolicy};
    use crate::models::{AttendanceRequest, RecordOutcome};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn subject(name: &str) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: format!("{}-1", &name[..3].to_uppercase()),
        }
    }

    fn event(subject_id: Uuid, day: u32, status: AttendanceStatus) -> AttendanceEvent {
        AttendanceEvent {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            subject_id,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            status,
            notes: None,
        }
    }

    #[test]
    fn empty_history_yields_zeroes_for_each_subject() {
        let subjects = vec![subject("Biology"), subject("History")];
        let summaries = summarize_events(&subjects, &[]);
        assert_eq!(summaries.len(), 2);
        for summary in summaries {
            assert_eq!(summary.total_classes, 0);
            assert_eq!(summary.classes_attended, 0);
            assert_eq!(summary.attendance_percentage, 0.0);
        }
    }

    #[test]
    fn only_present_counts_as_attended() {
        let math = subject("Mathematics");
        let events = vec![
            event(math.id, 1, AttendanceStatus::Present),
            event(math.id, 2, AttendanceStatus::Absent),
            event(math.id, 3, AttendanceStatus::Present),
            event(math.id, 4, AttendanceStatus::Late),
        ];
        let summaries = summarize_events(std::slice::from_ref(&math), &events);
        assert_eq!(summaries[0].classes_attended, 2);
        assert_eq!(summaries[0].total_classes, 4);
        assert_eq!(summaries[0].attendance_percentage, 50.0);
    }

    #[test]
    fn two_of_three_rounds_to_two_decimals() {
        let math = subject("Mathematics");
        let events = vec![
            event(math.id, 1, AttendanceStatus::Present),
            event(math.id, 2, AttendanceStatus::Absent),
            event(math.id, 3, AttendanceStatus::Present),
        ];
        let summaries = summarize_events(std::slice::from_ref(&math), &events);
        assert_eq!(summaries[0].classes_attended, 2);
        assert_eq!(summaries[0].total_classes, 3);
        assert!((summaries[0].attendance_percentage - 66.67).abs() < 1e-9);
    }

    #[test]
    fn events_outside_enrollment_are_ignored() {
        let art = subject("Art");
        let dropped = Uuid::new_v4();
        let events = vec![
            event(art.id, 1, AttendanceStatus::Present),
            event(dropped, 1, AttendanceStatus::Absent),
        ];
        let summaries = summarize_events(std::slice::from_ref(&art), &events);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_classes, 1);
    }

    #[test]
    fn risk_first_sorts_ascending_by_percentage() {
        let (good, bad) = (subject("Geography"), subject("Physics"));
        let events = vec![
            event(good.id, 1, AttendanceStatus::Present),
            event(bad.id, 1, AttendanceStatus::Absent),
        ];
        let mut summaries = summarize_events(&[good, bad], &events);
        sort_summaries(&mut summaries, SummaryOrder::RiskFirst);
        assert_eq!(summaries[0].subject_name, "Physics");
        assert_eq!(summaries[1].subject_name, "Geography");
    }

    #[tokio::test]
    async fn overwrite_replaces_rather_than_appends() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();
        let science = subject("Science");
        let subject_id = science.id;
        store.enroll(student, science).await;
        let policy = LedgerPolicy::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        let mut submission = AttendanceRequest {
            student_id: student,
            subject_id,
            date,
            status: AttendanceStatus::Present,
            notes: None,
        };
        record_attendance(&store, &store, policy, submission.clone(), false)
            .await
            .unwrap();
        submission.status = AttendanceStatus::Absent;
        let outcome = record_attendance(&store, &store, policy, submission, true)
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Updated);

        let summaries = summarize(&store, &store, student, SummaryOrder::Enrollment)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].classes_attended, 0);
        assert_eq!(summaries[0].total_classes, 1);
    }
}
