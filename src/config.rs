use anyhow::Context;

use crate::ledger::LedgerPolicy;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub policy: LedgerPolicy,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("ATTENDANCE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("ATTENDANCE_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => 5,
        };

        let enforce_enrollment = match lookup("ATTENDANCE_ENFORCE_ENROLLMENT") {
            Some(raw) => parse_flag(&raw).with_context(|| {
                format!("ATTENDANCE_ENFORCE_ENROLLMENT must be true or false: {raw}")
            })?,
            None => true,
        };

        Ok(Self {
            database_url,
            max_connections: max_connections.max(1),
            policy: LedgerPolicy { enforce_enrollment },
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
