//! Review assignments, reviews, and the reviewer-queue heuristics.

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// Reviewers with this many active assignments are reported as overloaded.
pub const REVIEWER_CAPACITY: usize = 3;

pub const SCORE_RANGE: RangeInclusive<i64> = 1..=10;

const HIGH_PRIORITY_DAYS: i64 = 3;
const MEDIUM_PRIORITY_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Declined,
    Submitted,
}

impl AssignmentStatus {
    /// Counts toward the reviewer's workload.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Accept,
    MinorRevision,
    MajorRevision,
    Reject,
}

impl FromStr for Recommendation {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACCEPT" => Ok(Self::Accept),
            "MINOR_REVISION" => Ok(Self::MinorRevision),
            "MAJOR_REVISION" => Ok(Self::MajorRevision),
            "REJECT" => Ok(Self::Reject),
            other => Err(WorkflowError::validation(format!(
                "Invalid recommendation: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub assignment_id: String,
    pub score: i64,
    pub recommendation: Recommendation,
    pub comment_to_editor: String,
    pub comment_to_author: String,
    pub submitted_at: DateTime<Utc>,
}

/// Raw review as received from a reviewer; validated by [`ReviewInput::validate`].
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub score: i64,
    pub recommendation: String,
    #[serde(default)]
    pub comment_to_editor: String,
    #[serde(default)]
    pub comment_to_author: String,
}

impl ReviewInput {
    pub fn validate(&self) -> Result<Recommendation> {
        if !SCORE_RANGE.contains(&self.score) {
            return Err(WorkflowError::validation(format!(
                "Score {} is outside {}..={}",
                self.score,
                SCORE_RANGE.start(),
                SCORE_RANGE.end()
            )));
        }
        self.recommendation.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewAssignment {
    pub id: String,
    pub submission_id: String,
    pub reviewer_id: String,
    pub status: AssignmentStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub review: Option<Review>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Queue priority for a reviewer: overdue or due within 3 days is high,
/// within 7 days medium, later low. Without a due date, medium.
pub fn priority(due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Priority {
    let Some(due_at) = due_at else {
        return Priority::Medium;
    };
    let remaining = due_at - now;
    if remaining <= Duration::days(HIGH_PRIORITY_DAYS) {
        Priority::High
    } else if remaining <= Duration::days(MEDIUM_PRIORITY_DAYS) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn is_available(active: usize) -> bool {
    active < REVIEWER_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workload {
    pub reviewer_id: String,
    pub name: String,
    pub active: usize,
    pub available: bool,
}
