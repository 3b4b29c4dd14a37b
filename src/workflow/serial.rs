use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::error::{Result, WorkflowError};

pub const MAX_SERIAL_ATTEMPTS: usize = 8;

static SERIAL: OnceLock<Regex> = OnceLock::new();

/// Source of serial-number candidates. Uniqueness is checked by the caller.
pub trait SerialGenerator: Send + Sync {
    fn candidate(&self, now: DateTime<Utc>) -> String;
}

/// `YYYYMMDDHHMMSS-XXXXXX`: UTC timestamp plus six hex digits of a v4 UUID.
pub struct TimestampSerials;

impl SerialGenerator for TimestampSerials {
    fn candidate(&self, now: DateTime<Utc>) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}",
            now.format("%Y%m%d%H%M%S"),
            random[..6].to_uppercase()
        )
    }
}

pub fn is_valid_serial(serial: &str) -> bool {
    SERIAL
        .get_or_init(|| Regex::new(r"^\d{14}-[0-9A-F]{6}$").expect("serial pattern is valid"))
        .is_match(serial)
}

/// Draws candidates until one is unused. Must run inside the transaction
/// that stores the serial, so the check and the write see the same snapshot.
pub(crate) async fn allocate(
    conn: &mut SqliteConnection,
    generator: &dyn SerialGenerator,
    now: DateTime<Utc>,
) -> Result<String> {
    for attempt in 1..=MAX_SERIAL_ATTEMPTS {
        let candidate = generator.candidate(now);
        if !db::serial_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
        warn!(
            "Serial number {} already taken (attempt {}/{})",
            candidate, attempt, MAX_SERIAL_ATTEMPTS
        );
    }
    Err(WorkflowError::conflict(format!(
        "Could not allocate a unique serial number after {} attempts",
        MAX_SERIAL_ATTEMPTS
    )))
}
