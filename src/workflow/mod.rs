//! The submission/review/decision engine.
//!
//! Every mutating operation takes an explicit [`Actor`], checks roles before
//! touching the database, and runs its writes inside a single transaction.
//! Notifications go out only after commit.

mod assignments;
mod conferences;
mod decisions;
mod drafts;
mod lifecycle;
mod members;
mod serial;

pub use assignments::{AssignmentOutcome, QueueEntry};
pub use conferences::{Conference, NewConference};
pub use members::{Member, NewMember};
pub use serial::{is_valid_serial, SerialGenerator, TimestampSerials, MAX_SERIAL_ATTEMPTS};

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::{self, DbPool};
use crate::domain::{Actor, Submission};
use crate::error::{Result, WorkflowError};
use crate::notify::{Dispatcher, Notification, NotificationKind, Notifier};
use crate::storage::FileStore;

pub struct Workflow {
    pool: DbPool,
    files: Arc<dyn FileStore>,
    dispatcher: Dispatcher,
    serials: Arc<dyn SerialGenerator>,
}

impl Workflow {
    pub fn new(pool: DbPool, files: Arc<dyn FileStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            files,
            dispatcher: Dispatcher::new(notifier),
            serials: Arc::new(TimestampSerials),
        }
    }

    pub fn with_serial_generator(mut self, serials: Arc<dyn SerialGenerator>) -> Self {
        self.serials = serials;
        self
    }
}

async fn load_submission(conn: &mut SqliteConnection, id: &str) -> Result<Submission> {
    db::find_submission(conn, id)
        .await?
        .ok_or_else(|| WorkflowError::not_found(format!("Submission {}", id)))
}

/// Creator, editorial staff, and reviewers who have not declined may look.
fn can_view(actor: &Actor, submission: &Submission) -> bool {
    actor.id == submission.created_by
        || actor.is_editorial()
        || submission.review_assignments.iter().any(|a| {
            a.reviewer_id == actor.id && a.status != crate::domain::AssignmentStatus::Declined
        })
}

fn require_creator(actor: &Actor, submission: &Submission, action: &str) -> Result<()> {
    if actor.id == submission.created_by {
        Ok(())
    } else {
        Err(WorkflowError::permission(format!(
            "Only the creator of submission {} may {}",
            submission.id, action
        )))
    }
}

/// Notification for the submission's corresponding author, if it has one.
fn to_corresponding_author(
    submission: &Submission,
    kind: NotificationKind,
    mut data: serde_json::Value,
) -> Option<Notification> {
    let author = submission.corresponding_author()?;
    if let Some(map) = data.as_object_mut() {
        map.insert("submission_id".into(), submission.id.clone().into());
        map.insert("title".into(), submission.title.clone().into());
        map.insert(
            "serial_number".into(),
            submission.serial_number.clone().into(),
        );
        map.insert("author_name".into(), author.name.clone().into());
    }
    Some(Notification {
        kind,
        recipient: author.email.clone(),
        data,
    })
}
