//! Submission lifecycle state machine.
//!
//! ```text
//! DRAFT ──submit──▶ SUBMITTED ──assign──▶ UNDER_REVIEW ◀─┐ (re-assign)
//!                      ▲                       │  └──────┘
//!            resubmit  │                   decision
//!                      │                       ▼
//!            REVISION_REQUIRED ◀── ACCEPTED | REVISION_REQUIRED | REJECTED
//! ```
//!
//! Decisions are only recorded once a submission is under review.
//!
//! Any pre-terminal state (DRAFT, SUBMITTED, UNDER_REVIEW, REVISION_REQUIRED)
//! may move to WITHDRAWN. ACCEPTED, REJECTED and WITHDRAWN have no exits.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    UnderReview,
    RevisionRequired,
    Accepted,
    Rejected,
    Withdrawn,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::RevisionRequired => "REVISION_REQUIRED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (UnderReview, UnderReview)
                | (UnderReview, Accepted | RevisionRequired | Rejected)
                | (RevisionRequired, Submitted)
                | (Draft | Submitted | UnderReview | RevisionRequired, Withdrawn)
        )
    }

    /// Validates the edge `self -> next` and returns `next`.
    pub fn transition(self, next: SubmissionStatus) -> Result<SubmissionStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::state(format!(
                "Cannot move submission from {} to {}",
                self, next
            )))
        }
    }

    /// Content (title, authors, files) may only change in these states.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::RevisionRequired)
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, Self::Draft | Self::Withdrawn)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Withdrawn)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
