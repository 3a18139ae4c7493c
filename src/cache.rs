//! Optional materialized summaries.
//!
//! Reads fill the cache per student; any write that creates or updates a row
//! through [`SummaryCache::record`] drops that student's entry. Summaries are
//! cached in enrollment order and re-sorted per call.
//!
//! Each student carries a generation that `invalidate` bumps. A read only
//! stores its result if the generation it started under is still current, so
//! a snapshot taken before a concurrent write is never cached after it.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate::{self, SummaryOrder};
use crate::error::Result;
use crate::ledger::{self, LedgerPolicy};
use crate::models::{AttendanceRequest, AttendanceSummary, RecordOutcome};
use crate::store::{EnrollmentDirectory, RecordStore};

#[derive(Default)]
struct CacheState {
    entries: HashMap<Uuid, Vec<AttendanceSummary>>,
    generations: HashMap<Uuid, u64>,
}

impl CacheState {
    fn generation(&self, student_id: Uuid) -> u64 {
        self.generations.get(&student_id).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub struct SummaryCache {
    state: Mutex<CacheState>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn summarize(
        &self,
        store: &dyn RecordStore,
        enrollments: &dyn EnrollmentDirectory,
        student_id: Uuid,
        order: SummaryOrder,
    ) -> Result<Vec<AttendanceSummary>> {
        let (cached, generation) = {
            let state = self.state.lock().await;
            (
                state.entries.get(&student_id).cloned(),
                state.generation(student_id),
            )
        };

        let mut summaries = match cached {
            Some(summaries) => {
                debug!(%student_id, "summary cache hit");
                summaries
            }
            None => {
                let fresh =
                    aggregate::summarize(store, enrollments, student_id, SummaryOrder::Enrollment)
                        .await?;
                let mut state = self.state.lock().await;
                if state.generation(student_id) == generation {
                    state.entries.insert(student_id, fresh.clone());
                } else {
                    debug!(%student_id, "write landed during read, not caching");
                }
                fresh
            }
        };
        aggregate::sort_summaries(&mut summaries, order);
        Ok(summaries)
    }

    pub async fn record(
        &self,
        store: &dyn RecordStore,
        enrollments: &dyn EnrollmentDirectory,
        policy: LedgerPolicy,
        request: AttendanceRequest,
        overwrite: bool,
    ) -> Result<RecordOutcome> {
        let student_id = request.student_id;
        let outcome =
            ledger::record_attendance(store, enrollments, policy, request, overwrite).await?;
        if outcome != RecordOutcome::Unchanged {
            self.invalidate(student_id).await;
        }
        Ok(outcome)
    }

    pub async fn invalidate(&self, student_id: Uuid) {
        let mut state = self.state.lock().await;
        *state.generations.entry(student_id).or_insert(0) += 1;
        if state.entries.remove(&student_id).is_some() {
            debug!(%student_id, "summary cache invalidated");
        }
    }
}
