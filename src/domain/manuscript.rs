use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::decision::Decision;
use super::review::ReviewAssignment;
use super::status::SubmissionStatus;
use crate::error::{Result, WorkflowError};

static EMAIL: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub is_corresponding: bool,
}

/// Checks an author list before it is written.
///
/// A complete list has at least one author and exactly one corresponding
/// author. Drafts may hold an incomplete list, so `complete = false` only
/// rejects what can never become valid (two corresponding authors, bad
/// emails, duplicates).
pub fn validate_authors(authors: &[Author], complete: bool) -> Result<()> {
    if complete && authors.is_empty() {
        return Err(WorkflowError::validation("At least one author is required"));
    }

    let mut seen = HashSet::new();
    for author in authors {
        if author.name.trim().is_empty() {
            return Err(WorkflowError::validation("Author name must not be empty"));
        }
        let email = author.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(WorkflowError::validation(format!(
                "Invalid author email: {}",
                author.email
            )));
        }
        if !seen.insert(email) {
            return Err(WorkflowError::validation(format!(
                "Author {} is listed twice",
                author.email
            )));
        }
    }

    let corresponding = authors.iter().filter(|a| a.is_corresponding).count();
    match corresponding {
        1 => Ok(()),
        0 if !complete => Ok(()),
        0 => Err(WorkflowError::validation(
            "Exactly one corresponding author is required",
        )),
        n => Err(WorkflowError::validation(format!(
            "Exactly one corresponding author is required, found {}",
            n
        ))),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreements {
    #[serde(default)]
    pub original_work: bool,
    #[serde(default)]
    pub not_under_review_elsewhere: bool,
    #[serde(default)]
    pub consent_to_publish: bool,
}

impl Agreements {
    pub fn all() -> Self {
        Self {
            original_work: true,
            not_under_review_elsewhere: true,
            consent_to_publish: true,
        }
    }

    pub fn all_accepted(&self) -> bool {
        self.original_work && self.not_under_review_elsewhere && self.consent_to_publish
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperType {
    #[default]
    Regular,
    Short,
    Poster,
    Demo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    Manuscript,
    Supplementary,
    ResponseLetter,
    CameraReady,
}

impl FileKind {
    pub fn allowed_mime_types(&self) -> &'static [&'static str] {
        match self {
            Self::Manuscript | Self::CameraReady => &["application/pdf"],
            Self::ResponseLetter => &["application/pdf", "text/plain"],
            Self::Supplementary => &[
                "application/pdf",
                "application/zip",
                "text/csv",
                "text/plain",
            ],
        }
    }

    pub fn accepts(&self, mime: &str) -> bool {
        self.allowed_mime_types().contains(&mime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    pub kind: FileKind,
    pub version: i64,
    pub path: String,
    pub checksum: String,
    pub size: i64,
    pub mime: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Highest version of `kind` among `files`.
pub fn current_file(files: &[FileAsset], kind: FileKind) -> Option<&FileAsset> {
    files
        .iter()
        .filter(|f| f.kind == kind)
        .max_by_key(|f| f.version)
}

/// Version number the next upload of `kind` receives.
pub fn next_version(files: &[FileAsset], kind: FileKind) -> i64 {
    current_file(files, kind).map_or(1, |f| f.version + 1)
}

/// Editable manuscript fields shared by drafts and direct submissions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManuscriptInput {
    pub conference_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub track: String,
    #[serde(default)]
    pub paper_type: PaperType,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub agreements: Agreements,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManuscriptPatch {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub track: Option<String>,
    pub paper_type: Option<PaperType>,
    pub keywords: Option<Vec<String>>,
    pub authors: Option<Vec<Author>>,
    pub agreements: Option<Agreements>,
}

/// Requirements a manuscript must meet before it leaves DRAFT.
pub fn validate_for_submission(
    title: &str,
    abstract_text: &str,
    track: &str,
    authors: &[Author],
    agreements: &Agreements,
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(WorkflowError::validation("Title is required"));
    }
    if abstract_text.trim().is_empty() {
        return Err(WorkflowError::validation("Abstract is required"));
    }
    if track.trim().is_empty() {
        return Err(WorkflowError::validation("Track is required"));
    }
    validate_authors(authors, true)?;
    if !agreements.all_accepted() {
        return Err(WorkflowError::validation(
            "All submission agreements must be accepted",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub id: String,
    pub conference_id: String,
    pub created_by: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub track: String,
    pub paper_type: PaperType,
    pub keywords: Vec<String>,
    pub agreements: Agreements,
    pub authors: Vec<Author>,
    pub files: Vec<FileAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn validate_for_submission(&self) -> Result<()> {
        validate_for_submission(
            &self.title,
            &self.abstract_text,
            &self.track,
            &self.authors,
            &self.agreements,
        )
    }

    /// Consumes the draft. Authors and files move into the new submission.
    pub fn into_submission(
        self,
        id: String,
        serial_number: String,
        now: DateTime<Utc>,
    ) -> Submission {
        Submission {
            id,
            conference_id: self.conference_id,
            created_by: self.created_by,
            source_draft_id: Some(self.id),
            title: self.title,
            abstract_text: self.abstract_text,
            track: self.track,
            paper_type: self.paper_type,
            keywords: self.keywords,
            agreements: self.agreements,
            status: SubmissionStatus::Submitted,
            serial_number: Some(serial_number),
            submitted_at: Some(now),
            decision_note: None,
            authors: self.authors,
            files: self.files,
            review_assignments: Vec::new(),
            decisions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: String,
    pub conference_id: String,
    pub created_by: String,
    pub source_draft_id: Option<String>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub track: String,
    pub paper_type: PaperType,
    pub keywords: Vec<String>,
    pub agreements: Agreements,
    pub status: SubmissionStatus,
    pub serial_number: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub authors: Vec<Author>,
    pub files: Vec<FileAsset>,
    pub review_assignments: Vec<ReviewAssignment>,
    pub decisions: Vec<Decision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn corresponding_author(&self) -> Option<&Author> {
        self.authors.iter().find(|a| a.is_corresponding)
    }

    pub fn completed_reviews(&self) -> usize {
        self.review_assignments
            .iter()
            .filter(|a| a.review.is_some())
            .count()
    }

    /// Strips what authors must not see: confidential comments to the editor.
    pub fn redact_for_author(mut self) -> Self {
        for assignment in &mut self.review_assignments {
            if let Some(review) = assignment.review.as_mut() {
                review.comment_to_editor.clear();
            }
        }
        self
    }
}

/// A manuscript is either still a draft or already a submission, never both.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "manuscript", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Manuscript {
    Draft(Draft),
    Submission(Submission),
}
