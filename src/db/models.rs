use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::domain::{
    Agreements, AssignmentStatus, Author, FileAsset, FileKind, PaperType, Recommendation, Review,
    ReviewAssignment, SubmissionStatus,
};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct ConferenceRow {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub is_active: bool,
    pub tracks: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct DraftRow {
    pub id: String,
    pub conference_id: String,
    pub created_by: String,
    pub title: String,
    #[sqlx(rename = "abstract")]
    pub abstract_text: String,
    pub track: String,
    pub paper_type: PaperType,
    pub keywords: String,
    pub agreed_original_work: bool,
    pub agreed_not_under_review: bool,
    pub agreed_consent_to_publish: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftRow {
    pub fn agreements(&self) -> Agreements {
        Agreements {
            original_work: self.agreed_original_work,
            not_under_review_elsewhere: self.agreed_not_under_review,
            consent_to_publish: self.agreed_consent_to_publish,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SubmissionRow {
    pub id: String,
    pub conference_id: String,
    pub created_by: String,
    pub source_draft_id: Option<String>,
    pub title: String,
    #[sqlx(rename = "abstract")]
    pub abstract_text: String,
    pub track: String,
    pub paper_type: PaperType,
    pub keywords: String,
    pub agreed_original_work: bool,
    pub agreed_not_under_review: bool,
    pub agreed_consent_to_publish: bool,
    pub status: SubmissionStatus,
    pub serial_number: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    pub fn agreements(&self) -> Agreements {
        Agreements {
            original_work: self.agreed_original_work,
            not_under_review_elsewhere: self.agreed_not_under_review,
            consent_to_publish: self.agreed_consent_to_publish,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AuthorRow {
    pub name: String,
    pub email: String,
    pub affiliation: Option<String>,
    pub is_corresponding: bool,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Author {
            name: row.name,
            email: row.email,
            affiliation: row.affiliation,
            is_corresponding: row.is_corresponding,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct FileRow {
    pub kind: FileKind,
    pub version: i64,
    pub path: String,
    pub checksum: String,
    pub size: i64,
    pub mime: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<FileRow> for FileAsset {
    fn from(row: FileRow) -> Self {
        FileAsset {
            kind: row.kind,
            version: row.version,
            path: row.path,
            checksum: row.checksum,
            size: row.size,
            mime: row.mime,
            uploaded_at: row.uploaded_at,
        }
    }
}

/// An assignment left-joined with its review, if one was submitted.
#[derive(Debug, FromRow)]
pub struct AssignmentRow {
    pub id: String,
    pub submission_id: String,
    pub reviewer_id: String,
    pub status: AssignmentStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub score: Option<i64>,
    pub recommendation: Option<Recommendation>,
    pub comment_to_editor: Option<String>,
    pub comment_to_author: Option<String>,
    pub review_submitted_at: Option<DateTime<Utc>>,
}

impl From<AssignmentRow> for ReviewAssignment {
    fn from(row: AssignmentRow) -> Self {
        let review = match (row.score, row.recommendation, row.review_submitted_at) {
            (Some(score), Some(recommendation), Some(submitted_at)) => Some(Review {
                assignment_id: row.id.clone(),
                score,
                recommendation,
                comment_to_editor: row.comment_to_editor.unwrap_or_default(),
                comment_to_author: row.comment_to_author.unwrap_or_default(),
                submitted_at,
            }),
            _ => None,
        };
        ReviewAssignment {
            id: row.id,
            submission_id: row.submission_id,
            reviewer_id: row.reviewer_id,
            status: row.status,
            due_at: row.due_at,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            review,
        }
    }
}

/// A reviewer's queue entry: the assignment plus what the reviewer needs to
/// recognise the paper.
#[derive(Debug, FromRow)]
pub struct QueueRow {
    pub id: String,
    pub submission_id: String,
    pub status: AssignmentStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub title: String,
    pub serial_number: Option<String>,
    pub submission_status: SubmissionStatus,
}

#[derive(Debug, FromRow)]
pub struct LoadRow {
    pub id: String,
    pub name: String,
    pub active: i64,
}

pub(crate) fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub(crate) fn encode_string_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
