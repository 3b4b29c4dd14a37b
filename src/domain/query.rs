use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::SubmissionStatus;

/// Whose submissions a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListScope {
    /// Submissions created by the actor.
    #[default]
    Authored,
    /// Submissions the actor is assigned to review (declined ones excluded).
    Reviewing,
    /// Every submission; editorial roles only.
    Editorial,
}

/// Supported submission filters. Unset fields do not filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionQuery {
    #[serde(default)]
    pub scope: ListScope,
    pub status: Option<SubmissionStatus>,
    /// Conference year.
    pub year: Option<i32>,
    /// Case-insensitive substring of title, abstract or serial number.
    pub search: Option<String>,
}

impl SubmissionQuery {
    pub fn scope(scope: ListScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// `%term%` LIKE pattern, or `None` for blank terms.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", t.to_lowercase()))
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubmissionSummary {
    pub id: String,
    pub conference_id: String,
    pub year: i32,
    pub created_by: String,
    pub title: String,
    pub track: String,
    pub status: SubmissionStatus,
    pub serial_number: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
