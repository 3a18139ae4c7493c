use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use attendance_ledger::aggregate::{self, SummaryOrder};
use attendance_ledger::config::Settings;
use attendance_ledger::db::{self, PgStore};
use attendance_ledger::ledger;
use attendance_ledger::models::{AttendanceKey, AttendanceRequest, AttendanceStatus, RecordOutcome};
use attendance_ledger::store::{EnrollmentDirectory, RecordStore};
use attendance_ledger::{report, risk, trend};

#[derive(Parser)]
#[command(name = "attendance-ledger")]
#[command(
    about = "Per-subject attendance ledger with summaries, trends and risk tiers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo subjects, enrollments and records
    Seed,
    /// Import historical attendance from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Register a subject, optionally enrolling a student in it
    AddSubject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        student: Option<Uuid>,
    },
    /// Remove a subject from a student's enrollment
    Unenroll {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        subject: String,
    },
    /// Enroll a student in a subject by code
    Enroll {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        subject: String,
    },
    /// List the subjects a student is enrolled in
    Subjects {
        #[arg(long)]
        student: Uuid,
    },
    /// Report whether a record already exists for a date
    Check {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record attendance for one subject and date
    Record {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        subject: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        status: AttendanceStatus,
        #[arg(long)]
        notes: Option<String>,
        /// Replace an existing record for the same date
        #[arg(long)]
        overwrite: bool,
    },
    /// Per-subject attendance summary
    Summary {
        #[arg(long)]
        student: Uuid,
        /// Lowest attendance first
        #[arg(long)]
        risk_first: bool,
        #[arg(long)]
        json: bool,
    },
    /// Daily attendance trend for one subject
    Trend {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        student: Uuid,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&store).await?;
            println!("Seed data inserted for student {}.", db::DEMO_STUDENT_ID);
        }
        Commands::Import { csv } => {
            let stats = db::import_csv(&store, settings.policy, &csv).await?;
            println!(
                "Imported {} new and {} updated records from {}.",
                stats.created,
                stats.updated,
                csv.display()
            );
        }
        Commands::AddSubject {
            name,
            code,
            student,
        } => {
            let subject = store.add_subject(&name, &code).await?;
            println!("Subject {} ({}) registered.", subject.name, subject.code);
            if let Some(student) = student {
                store.enroll(student, subject.id).await?;
                println!("Enrolled in {}.", subject.code);
            }
        }
        Commands::Unenroll { student, subject } => {
            let subject_id = resolve_subject(&store, &subject).await?;
            if store.unenroll(student, subject_id).await? {
                println!("Removed {subject} from enrollment.");
            } else {
                println!("Not enrolled in {subject}.");
            }
        }
        Commands::Enroll { student, subject } => {
            let subject_id = resolve_subject(&store, &subject).await?;
            if store.enroll(student, subject_id).await? {
                println!("Enrolled in {subject}.");
            } else {
                println!("Already enrolled in {subject}.");
            }
        }
        Commands::Subjects { student } => {
            let subjects = store.list_enrolled_subjects(student).await?;
            if subjects.is_empty() {
                println!("No enrolled subjects.");
            }
            for subject in subjects {
                println!("- {} ({})", subject.name, subject.code);
            }
        }
        Commands::Check {
            student,
            subject,
            date,
        } => {
            let key = AttendanceKey {
                student_id: student,
                subject_id: resolve_subject(&store, &subject).await?,
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
            };
            match ledger::check_conflict(&store, &key).await? {
                Some(existing) => println!(
                    "Attendance already recorded for {} on {}: {}.",
                    subject, existing.date, existing.status
                ),
                None => println!("No attendance recorded for {} on {}.", subject, key.date),
            }
        }
        Commands::Record {
            student,
            subject,
            date,
            status,
            notes,
            overwrite,
        } => {
            let request = AttendanceRequest {
                student_id: student,
                subject_id: resolve_subject(&store, &subject).await?,
                date: date.unwrap_or_else(|| Utc::now().date_naive()),
                status,
                notes,
            };
            let date = request.date;
            match ledger::record_attendance(&store, &store, settings.policy, request, overwrite)
                .await?
            {
                RecordOutcome::Created => println!("Attendance recorded for {subject} on {date}."),
                RecordOutcome::Updated => println!("Attendance updated for {subject} on {date}."),
                RecordOutcome::Unchanged => println!(
                    "Attendance already exists for {subject} on {date}; \
                     rerun with --overwrite to update it."
                ),
            }
        }
        Commands::Summary {
            student,
            risk_first,
            json,
        } => {
            let order = if risk_first {
                SummaryOrder::RiskFirst
            } else {
                SummaryOrder::Enrollment
            };
            let summaries = aggregate::summarize(&store, &store, student, order).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                return Ok(());
            }
            if summaries.is_empty() {
                println!("No enrolled subjects.");
                return Ok(());
            }
            for (summary, tier) in risk::assess(&summaries)? {
                println!(
                    "- {} ({}): {}/{} classes, {:.2}% [{}]",
                    summary.subject_name,
                    summary.subject_code,
                    summary.classes_attended,
                    summary.total_classes,
                    summary.attendance_percentage,
                    tier
                );
            }
        }
        Commands::Trend {
            student,
            subject,
            json,
        } => {
            let subject_id = resolve_subject(&store, &subject).await?;
            let points = trend::trend(&store, &store, student, subject_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
                return Ok(());
            }
            if points.is_empty() {
                println!("No attendance recorded for {subject}.");
                return Ok(());
            }
            for point in points {
                println!(
                    "{}  {:>6.2}%  ({} present, {} absent, {} late)",
                    point.date,
                    point.daily_percentage,
                    point.present_count,
                    point.absent_count,
                    point.late_count
                );
            }
        }
        Commands::Report { student, out } => {
            let summaries =
                aggregate::summarize(&store, &store, student, SummaryOrder::Enrollment).await?;
            let mut trends = HashMap::new();
            for summary in &summaries {
                let points = trend::trend(&store, &store, student, summary.subject_id).await?;
                trends.insert(summary.subject_id, points);
            }
            let events = store.query_by_student(student).await?;
            let report =
                report::build_report(&student.to_string(), &summaries, &trends, &events)?;
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Accepts either a subject code or a subject id.
async fn resolve_subject(store: &PgStore, subject: &str) -> anyhow::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(subject) {
        return Ok(id);
    }
    let found = store
        .subject_by_code(subject)
        .await?
        .with_context(|| format!("unknown subject code '{subject}'"))?;
    Ok(found.id)
}
