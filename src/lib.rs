//! Attendance ledger and aggregation engine.
//!
//! Records one attendance event per (student, subject, date) and derives
//! per-subject summaries, date-ordered trends and risk tiers at read time.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod report;
pub mod risk;
pub mod store;
pub mod trend;

pub use error::{AttendanceError, Result};
