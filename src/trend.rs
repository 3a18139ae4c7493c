use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate::percentage;
use crate::error::Result;
use crate::ledger::ensure_enrolled;
use crate::models::{AttendanceEvent, AttendanceStatus, TrendPoint};
use crate::store::{EnrollmentDirectory, RecordStore};

pub async fn trend(
    store: &dyn RecordStore,
    enrollments: &dyn EnrollmentDirectory,
    student_id: Uuid,
    subject_id: Uuid,
) -> Result<Vec<TrendPoint>> {
    ensure_enrolled(enrollments, student_id, subject_id).await?;
    let events = store.query_by_subject(student_id, subject_id).await?;
    debug!(%student_id, %subject_id, events = events.len(), "building attendance trend");
    Ok(trend_points(&events).collect())
}

/// One point per distinct date, ascending. Days without events are not filled
/// in, and several events on one date fold into a single point.
pub fn trend_points(events: &[AttendanceEvent]) -> impl Iterator<Item = TrendPoint> {
    let mut by_date: BTreeMap<NaiveDate, [u32; 3]> = BTreeMap::new();
    for event in events {
        let counts = by_date.entry(event.date).or_insert([0; 3]);
        match event.status {
            AttendanceStatus::Present => counts[0] += 1,
            AttendanceStatus::Absent => counts[1] += 1,
            AttendanceStatus::Late => counts[2] += 1,
        }
    }

    by_date.into_iter().map(|(date, [present, absent, late])| {
        let total = present + absent + late;
        TrendPoint {
            date,
            present_count: present,
            absent_count: absent,
            late_count: late,
            total_count: total,
            daily_percentage: percentage(present, total),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttendanceError;
    use crate::models::Subject;
    use crate::store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn event(subject_id: Uuid, date: NaiveDate, status: AttendanceStatus) -> AttendanceEvent {
        AttendanceEvent {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            subject_id,
            date,
            status,
            notes: None,
        }
    }

    #[test]
    fn same_day_events_fold_into_one_point() {
        let subject = Uuid::new_v4();
        let events = vec![
            event(subject, day(1), AttendanceStatus::Present),
            event(subject, day(1), AttendanceStatus::Absent),
        ];
        let points: Vec<_> = trend_points(&events).collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].total_count, 2);
        assert_eq!(points[0].daily_percentage, 50.0);
    }

    #[test]
    fn points_are_date_ordered_without_gap_filling() {
        let subject = Uuid::new_v4();
        let events = vec![
            event(subject, day(3), AttendanceStatus::Present),
            event(subject, day(1), AttendanceStatus::Present),
            event(subject, day(2), AttendanceStatus::Absent),
            event(subject, day(9), AttendanceStatus::Late),
        ];
        let points: Vec<_> = trend_points(&events).collect();
        let dates: Vec<_> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3), day(9)]);
        let percentages: Vec<_> = points.iter().map(|p| p.daily_percentage).collect();
        assert_eq!(percentages, vec![100.0, 0.0, 100.0, 0.0]);
        assert_eq!(points[3].late_count, 1);
    }

    #[test]
    fn recomputation_is_identical() {
        let subject = Uuid::new_v4();
        let events = vec![
            event(subject, day(2), AttendanceStatus::Late),
            event(subject, day(1), AttendanceStatus::Present),
        ];
        let first: Vec<_> = trend_points(&events).collect();
        let second: Vec<_> = trend_points(&events).collect();
        assert_eq!(first, second);
        assert_eq!(trend_points(&[]).count(), 0);
    }

    #[tokio::test]
    async fn trend_reads_one_subject_from_store() {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();
        let subject = Subject {
            id: Uuid::new_v4(),
            name: "English".to_string(),
            code: "ENG110".to_string(),
        };
        let subject_id = subject.id;
        store.enroll(student, subject).await;
        for (d, status) in [
            (1, AttendanceStatus::Present),
            (2, AttendanceStatus::Absent),
            (3, AttendanceStatus::Present),
        ] {
            let mut e = event(subject_id, day(d), status);
            e.student_id = student;
            store.upsert(e).await.unwrap();
        }

        let points = trend(&store, &store, student, subject_id).await.unwrap();
        let percentages: Vec<_> = points.iter().map(|p| p.daily_percentage).collect();
        assert_eq!(percentages, vec![100.0, 0.0, 100.0]);

        let err = trend(&store, &store, student, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NotEnrolled { .. }));
    }
}
