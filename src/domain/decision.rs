use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::review::{Recommendation, Review};
use super::status::SubmissionStatus;
use crate::error::{Result, WorkflowError};

const EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionResult {
    Accept,
    Revise,
    Reject,
}

impl DecisionResult {
    /// Status a submission moves to once this decision is recorded.
    pub fn target_status(self) -> SubmissionStatus {
        match self {
            Self::Accept => SubmissionStatus::Accepted,
            Self::Revise => SubmissionStatus::RevisionRequired,
            Self::Reject => SubmissionStatus::Rejected,
        }
    }
}

impl FromStr for DecisionResult {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACCEPT" => Ok(Self::Accept),
            "REVISE" => Ok(Self::Revise),
            "REJECT" => Ok(Self::Reject),
            other => Err(WorkflowError::validation(format!(
                "Invalid decision result: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Decision {
    pub id: String,
    pub submission_id: String,
    pub decided_by: String,
    pub result: DecisionResult,
    pub note: String,
    pub decided_at: DateTime<Utc>,
}

/// Aggregate of the submitted reviews, shown to editors next to the decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub completed: usize,
    pub mean_score: Option<f64>,
    pub suggestion: Option<DecisionResult>,
}

impl ReviewSummary {
    pub fn from_reviews<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        let reviews: Vec<&Review> = reviews.into_iter().collect();
        if reviews.is_empty() {
            return Self {
                completed: 0,
                mean_score: None,
                suggestion: None,
            };
        }

        let total: i64 = reviews.iter().map(|r| r.score).sum();
        let mean_score = total as f64 / reviews.len() as f64;

        let any = |rec: Recommendation| reviews.iter().any(|r| r.recommendation == rec);
        let all = |rec: Recommendation| reviews.iter().all(|r| r.recommendation == rec);

        // Unanimity decides; any revision request or split opinion means revise.
        let suggestion = if all(Recommendation::Accept) {
            DecisionResult::Accept
        } else if all(Recommendation::Reject) {
            DecisionResult::Reject
        } else if any(Recommendation::Reject) && !any(Recommendation::Accept) && mean_score < 4.0 {
            DecisionResult::Reject
        } else {
            DecisionResult::Revise
        };

        Self {
            completed: reviews.len(),
            mean_score: Some(mean_score),
            suggestion: Some(suggestion),
        }
    }
}

/// First paragraph of `text`, cut to a notification-friendly length.
pub fn excerpt(text: &str) -> String {
    let first = text.split("\n\n").next().unwrap_or(text).trim();
    if first.chars().count() > EXCERPT_CHARS {
        let cut: String = first.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}
