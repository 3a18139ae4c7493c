use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::{AttendanceError, Result};
use crate::ledger::{self, LedgerPolicy};
use crate::models::{
    AttendanceEvent, AttendanceKey, AttendanceRequest, AttendanceStatus, RecordOutcome, Subject,
};
use crate::store::{EnrollmentDirectory, RecordStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply attendance_ledger migrations")?;
    info!("attendance_ledger schema is current");
    Ok(())
}

/// Trims both fields and rejects blanks before a subject reaches the registry.
pub fn validate_subject(name: &str, code: &str) -> Result<(String, String)> {
    let name = name.trim();
    let code = code.trim();
    if name.is_empty() {
        return Err(AttendanceError::Validation("subject name is required".to_string()));
    }
    if code.is_empty() {
        return Err(AttendanceError::Validation("subject code is required".to_string()));
    }
    Ok((name.to_string(), code.to_string()))
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn subject_by_code(&self, code: &str) -> Result<Option<Subject>> {
        let row = sqlx::query(
            "SELECT id, name, code FROM attendance_ledger.subjects WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Subject {
            id: row.get("id"),
            name: row.get("name"),
            code: row.get("code"),
        }))
    }

    /// Creates the subject, or renames the one already registered under `code`.
    pub async fn add_subject(&self, name: &str, code: &str) -> Result<Subject> {
        let (name, code) = validate_subject(name, code)?;
        let row = sqlx::query(
            r#"
            INSERT INTO attendance_ledger.subjects (id, name, code)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, code
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(&code)
        .fetch_one(&self.pool)
        .await?;

        let subject = Subject {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
        };
        info!(subject_id = %subject.id, code = %subject.code, "subject registered");
        Ok(subject)
    }

    /// Removes the enrollment only. Recorded attendance stays in the ledger but
    /// drops out of summaries and trends.
    pub async fn unenroll(&self, student_id: Uuid, subject_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM attendance_ledger.student_subjects
            WHERE student_id = $1 AND subject_id = $2
            "#,
        )
        .bind(student_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn enroll(&self, student_id: Uuid, subject_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_ledger.student_subjects (student_id, subject_id)
            VALUES ($1, $2)
            ON CONFLICT (student_id, subject_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn event_from_row(row: &PgRow) -> Result<AttendanceEvent> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<AttendanceStatus>()
        .map_err(|err| AttendanceError::Storage(sqlx::Error::Decode(Box::new(err))))?;

    Ok(AttendanceEvent {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        subject_id: row.try_get("subject_id")?,
        date: row.try_get("date")?,
        status,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find(&self, key: &AttendanceKey) -> Result<Option<AttendanceEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, student_id, subject_id, date, status, notes
            FROM attendance_ledger.attendance_records
            WHERE student_id = $1 AND subject_id = $2 AND date = $3
            "#,
        )
        .bind(key.student_id)
        .bind(key.subject_id)
        .bind(key.date)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn upsert(&self, event: AttendanceEvent) -> Result<AttendanceEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO attendance_ledger.attendance_records
            (id, student_id, subject_id, date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, subject_id, date) DO UPDATE
            SET status = EXCLUDED.status, notes = EXCLUDED.notes, updated_at = now()
            RETURNING id, student_id, subject_id, date, status, notes
            "#,
        )
        .bind(event.id)
        .bind(event.student_id)
        .bind(event.subject_id)
        .bind(event.date)
        .bind(event.status.as_str())
        .bind(event.notes.as_deref())
        .fetch_one(&self.pool)
        .await?;

        event_from_row(&row)
    }

    async fn query_by_student(&self, student_id: Uuid) -> Result<Vec<AttendanceEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, subject_id, date, status, notes
            FROM attendance_ledger.attendance_records
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn query_by_subject(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
    ) -> Result<Vec<AttendanceEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, subject_id, date, status, notes
            FROM attendance_ledger.attendance_records
            WHERE student_id = $1 AND subject_id = $2
            ORDER BY date ASC
            "#,
        )
        .bind(student_id)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl EnrollmentDirectory for PgStore {
    async fn list_enrolled_subjects(&self, student_id: Uuid) -> Result<Vec<Subject>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.name, s.code
            FROM attendance_ledger.student_subjects ss
            JOIN attendance_ledger.subjects s ON s.id = ss.subject_id
            WHERE ss.student_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Subject {
                id: row.get("id"),
                name: row.get("name"),
                code: row.get("code"),
            })
            .collect())
    }
}

pub const DEMO_STUDENT_ID: &str = "2c905dbf-c77c-48e9-8545-4d795ec464a2";

pub async fn seed(store: &PgStore) -> anyhow::Result<()> {
    let student_id = Uuid::parse_str(DEMO_STUDENT_ID)?;
    let mut subjects = Vec::new();
    for (name, code) in [
        ("Mathematics", "MATH101"),
        ("Physics", "PHY101"),
        ("Literature", "LIT201"),
    ] {
        let subject = store.add_subject(name, code).await?;
        store.enroll(student_id, subject.id).await?;
        subjects.push(subject);
    }

    let records = vec![
        ("MATH101", (2026, 2, 2), "present", None),
        ("MATH101", (2026, 2, 3), "absent", Some("Dentist appointment")),
        ("MATH101", (2026, 2, 4), "present", None),
        ("PHY101", (2026, 2, 2), "late", Some("Bus delayed")),
        ("PHY101", (2026, 2, 3), "absent", None),
        ("LIT201", (2026, 2, 2), "present", None),
    ];

    for (code, (year, month, day), status, notes) in records {
        let subject_id = subjects
            .iter()
            .find(|subject| subject.code == code)
            .map(|subject| subject.id)
            .context("seed subject missing")?;
        let date = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;

        sqlx::query(
            r#"
            INSERT INTO attendance_ledger.attendance_records
            (id, student_id, subject_id, date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, subject_id, date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject_id)
        .bind(date)
        .bind(status)
        .bind(notes)
        .execute(store.pool())
        .await?;
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub created: usize,
    pub updated: usize,
}

/// Loads historical records. Every row is an overwrite-confirmed submission, so
/// repeated triples in the file collapse to the last one.
pub async fn import_csv(
    store: &PgStore,
    policy: LedgerPolicy,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportStats> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: Uuid,
        subject_code: String,
        date: NaiveDate,
        status: String,
        notes: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut stats = ImportStats::default();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let line = index + 2;
        let subject = store
            .subject_by_code(&row.subject_code)
            .await?
            .with_context(|| format!("line {line}: unknown subject code '{}'", row.subject_code))?;
        let status = row
            .status
            .parse::<AttendanceStatus>()
            .with_context(|| format!("line {line}: bad status"))?;

        let request = AttendanceRequest {
            student_id: row.student_id,
            subject_id: subject.id,
            date: row.date,
            status,
            notes: row.notes,
        };
        let outcome = ledger::record_attendance(store, store, policy, request, true)
            .await
            .with_context(|| format!("line {line}: import failed"))?;

        match outcome {
            RecordOutcome::Created => stats.created += 1,
            RecordOutcome::Updated => stats.updated += 1,
            RecordOutcome::Unchanged => {}
        }
    }

    info!(
        created = stats.created,
        updated = stats.updated,
        path = %csv_path.display(),
        "csv import finished"
    );
    Ok(stats)
}
