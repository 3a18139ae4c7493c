//! Collaborator contracts the engine reads from and writes through.
//!
//! [`RecordStore`] is the durable table of attendance events and
//! [`EnrollmentDirectory`] answers which subjects a student may record against.
//! `db::PgStore` backs both with Postgres; [`MemoryStore`] keeps everything in
//! process.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AttendanceEvent, AttendanceKey, Subject};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(&self, key: &AttendanceKey) -> Result<Option<AttendanceEvent>>;

    /// Insert-or-replace keyed by the triple. On replace only `status` and
    /// `notes` change; the stored row keeps its id.
    async fn upsert(&self, event: AttendanceEvent) -> Result<AttendanceEvent>;

    async fn query_by_student(&self, student_id: Uuid) -> Result<Vec<AttendanceEvent>>;

    /// Events for one subject, ascending by date.
    async fn query_by_subject(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
    ) -> Result<Vec<AttendanceEvent>>;
}

#[async_trait]
pub trait EnrollmentDirectory: Send + Sync {
    async fn list_enrolled_subjects(&self, student_id: Uuid) -> Result<Vec<Subject>>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<AttendanceKey, AttendanceEvent>>,
    enrollments: RwLock<HashMap<Uuid, Vec<Subject>>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enroll(&self, student_id: Uuid, subject: Subject) {
        let mut enrollments = self.enrollments.write().await;
        let subjects = enrollments.entry(student_id).or_default();
        if !subjects.iter().any(|existing| existing.id == subject.id) {
            subjects.push(subject);
        }
    }

    /// Drops the enrollment; recorded events are kept.
    pub async fn unenroll(&self, student_id: Uuid, subject_id: Uuid) -> bool {
        let mut enrollments = self.enrollments.write().await;
        let Some(subjects) = enrollments.get_mut(&student_id) else {
            return false;
        };
        let before = subjects.len();
        subjects.retain(|subject| subject.id != subject_id);
        subjects.len() < before
    }

    /// Simulates an unreachable store: every later upsert fails until reset.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, key: &AttendanceKey) -> Result<Option<AttendanceEvent>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn upsert(&self, event: AttendanceEvent) -> Result<AttendanceEvent> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolClosed.into());
        }

        let mut records = self.records.write().await;
        let stored = records
            .entry(event.key())
            .and_modify(|existing| {
                existing.status = event.status;
                existing.notes = event.notes.clone();
            })
            .or_insert(event);
        Ok(stored.clone())
    }

    async fn query_by_student(&self, student_id: Uuid) -> Result<Vec<AttendanceEvent>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|event| event.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn query_by_subject(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
    ) -> Result<Vec<AttendanceEvent>> {
        let records = self.records.read().await;
        let mut events: Vec<AttendanceEvent> = records
            .values()
            .filter(|event| event.student_id == student_id && event.subject_id == subject_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.date);
        Ok(events)
    }
}

#[async_trait]
impl EnrollmentDirectory for MemoryStore {
    async fn list_enrolled_subjects(&self, student_id: Uuid) -> Result<Vec<Subject>> {
        Ok(self
            .enrollments
            .read()
            .await
            .get(&student_id)
            .cloned()
            .unwrap_or_default())
    }
}
