use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{load_submission, Workflow};
use crate::db;
use crate::domain::{
    is_available, priority, Actor, AssignmentStatus, Priority, Review, ReviewAssignment,
    ReviewInput, Role, Submission, SubmissionStatus, Workload, EDITORIAL, REVIEWER_CAPACITY,
};
use crate::error::{Result, WorkflowError};
use crate::notify::{Notification, NotificationKind};

/// Result of [`Workflow::assign_reviewers`].
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub submission: Submission,
    /// Reviewers that got a new assignment row.
    pub created: Vec<String>,
    /// Reviewers whose existing assignment was refreshed.
    pub updated: Vec<String>,
    /// Reviewers now holding more than their capacity of active assignments.
    pub overloaded: Vec<String>,
}

/// One line of a reviewer's queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub assignment_id: String,
    pub submission_id: String,
    pub title: String,
    pub serial_number: Option<String>,
    pub submission_status: SubmissionStatus,
    pub status: AssignmentStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    /// Outstanding work: PENDING or ACCEPTED on a submission still open.
    pub active: bool,
}

impl Workflow {
    /// Assigns (or re-assigns) reviewers and moves the submission to
    /// UNDER_REVIEW. Capacity is reported, never enforced.
    pub async fn assign_reviewers(
        &self,
        actor: &Actor,
        submission_id: &str,
        reviewer_ids: &[String],
        due_at: Option<DateTime<Utc>>,
    ) -> Result<AssignmentOutcome> {
        actor.require_any(EDITORIAL, "Assigning reviewers")?;

        let mut seen = BTreeSet::new();
        let reviewer_ids: Vec<&str> = reviewer_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();
        if reviewer_ids.is_empty() {
            return Err(WorkflowError::validation("At least one reviewer is required"));
        }

        let now = Utc::now();
        if matches!(due_at, Some(due) if due <= now) {
            return Err(WorkflowError::validation("Due date must be in the future"));
        }

        let mut tx = db::begin_write(&self.pool).await?;
        let mut submission = load_submission(&mut tx, submission_id).await?;
        let next = submission.status.transition(SubmissionStatus::UnderReview)?;

        let mut created = Vec::new();
        let mut updated = Vec::new();
        let mut overloaded = Vec::new();
        let mut requests = Vec::new();

        for reviewer_id in reviewer_ids {
            let reviewer = db::find_user(&mut tx, reviewer_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found(format!("Reviewer {}", reviewer_id)))?;
            let roles = db::user_roles(&mut tx, reviewer_id).await?;
            if !roles.contains(&Role::Reviewer) {
                return Err(WorkflowError::validation(format!(
                    "{} does not hold the REVIEWER role",
                    reviewer.name
                )));
            }
            let is_author = submission
                .authors
                .iter()
                .any(|a| a.email.eq_ignore_ascii_case(&reviewer.email));
            if reviewer_id == submission.created_by || is_author {
                return Err(WorkflowError::validation(format!(
                    "{} is an author of this submission and cannot review it",
                    reviewer.name
                )));
            }

            let fresh = db::upsert_assignment(
                &mut tx,
                &Uuid::new_v4().to_string(),
                submission_id,
                reviewer_id,
                due_at,
                &actor.id,
                now,
            )
            .await?;
            if fresh {
                created.push(reviewer_id.to_string());
            } else {
                updated.push(reviewer_id.to_string());
            }

            let active = db::active_assignment_count(&mut tx, reviewer_id).await?;
            if active > REVIEWER_CAPACITY as i64 {
                warn!(
                    "Reviewer {} now holds {} active assignments (capacity {})",
                    reviewer_id, active, REVIEWER_CAPACITY
                );
                overloaded.push(reviewer_id.to_string());
            }

            requests.push(Notification {
                kind: NotificationKind::ReviewRequested,
                recipient: reviewer.email,
                data: serde_json::json!({
                    "submission_id": submission_id,
                    "title": submission.title,
                    "serial_number": submission.serial_number,
                    "reviewer_name": reviewer.name,
                    "due_at": due_at,
                }),
            });
        }

        submission.status = next;
        submission.updated_at = now;
        db::update_submission_state(&mut tx, &submission).await?;
        let submission = load_submission(&mut tx, submission_id).await?;
        tx.commit().await?;

        info!(
            "Submission {} under review: {} new, {} refreshed assignments",
            submission_id,
            created.len(),
            updated.len()
        );
        self.dispatcher.dispatch_all(requests);

        Ok(AssignmentOutcome {
            submission,
            created,
            updated,
            overloaded,
        })
    }

    /// The assigned reviewer accepts or declines a PENDING assignment.
    pub async fn respond_to_assignment(
        &self,
        actor: &Actor,
        assignment_id: &str,
        accept: bool,
    ) -> Result<ReviewAssignment> {
        let mut tx = db::begin_write(&self.pool).await?;
        let assignment = own_assignment(&mut tx, actor, assignment_id).await?;

        if assignment.status != AssignmentStatus::Pending {
            return Err(WorkflowError::state(format!(
                "Assignment {} is already {:?}",
                assignment_id, assignment.status
            )));
        }
        let status = if accept {
            AssignmentStatus::Accepted
        } else {
            AssignmentStatus::Declined
        };
        db::set_assignment_status(&mut tx, assignment_id, status, Utc::now()).await?;
        let assignment = own_assignment(&mut tx, actor, assignment_id).await?;
        tx.commit().await?;

        info!("Reviewer {} set assignment {} to {:?}", actor.id, assignment_id, status);
        Ok(assignment)
    }

    /// Records the review for an assignment. A review can be written once.
    pub async fn submit_review(
        &self,
        actor: &Actor,
        assignment_id: &str,
        input: ReviewInput,
    ) -> Result<ReviewAssignment> {
        actor.require_any(&[Role::Reviewer], "Submitting a review")?;
        let recommendation = input.validate()?;

        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        let assignment = own_assignment(&mut tx, actor, assignment_id).await?;

        if assignment.review.is_some() {
            return Err(WorkflowError::conflict(format!(
                "A review for assignment {} was already submitted",
                assignment_id
            )));
        }
        if assignment.status == AssignmentStatus::Declined {
            return Err(WorkflowError::state(format!(
                "Assignment {} was declined",
                assignment_id
            )));
        }
        let submission = load_submission(&mut tx, &assignment.submission_id).await?;
        if submission.status != SubmissionStatus::UnderReview {
            return Err(WorkflowError::state(format!(
                "Submission {} is {}, reviews are closed",
                submission.id, submission.status
            )));
        }

        let review = Review {
            assignment_id: assignment_id.to_string(),
            score: input.score,
            recommendation,
            comment_to_editor: input.comment_to_editor,
            comment_to_author: input.comment_to_author,
            submitted_at: now,
        };
        db::insert_review(&mut tx, &review).await?;
        db::set_assignment_status(&mut tx, assignment_id, AssignmentStatus::Submitted, now).await?;
        let assignment = own_assignment(&mut tx, actor, assignment_id).await?;
        tx.commit().await?;

        info!(
            "Review for submission {} submitted by {} ({:?}, score {})",
            submission.id, actor.id, recommendation, review.score
        );
        Ok(assignment)
    }

    /// A reviewer's queue, active work first, then by priority and due date.
    /// Editors may look at any reviewer's queue.
    pub async fn list_assignments_for_reviewer(
        &self,
        actor: &Actor,
        reviewer_id: Option<&str>,
    ) -> Result<Vec<QueueEntry>> {
        let reviewer_id = reviewer_id.unwrap_or(&actor.id);
        if reviewer_id != actor.id {
            actor.require_any(EDITORIAL, "Viewing another reviewer's queue")?;
        }

        let now = Utc::now();
        let mut conn = self.pool.acquire().await?;
        let mut queue: Vec<QueueEntry> = db::reviewer_queue(&mut conn, reviewer_id)
            .await?
            .into_iter()
            .map(|row| QueueEntry {
                priority: priority(row.due_at, now),
                active: row.status.is_active() && !row.submission_status.is_terminal(),
                assignment_id: row.id,
                submission_id: row.submission_id,
                title: row.title,
                serial_number: row.serial_number,
                submission_status: row.submission_status,
                status: row.status,
                due_at: row.due_at,
            })
            .collect();

        queue.sort_by(|a, b| {
            b.active
                .cmp(&a.active)
                .then(a.priority.cmp(&b.priority))
                .then_with(|| match (a.due_at, b.due_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });

        debug!("Queue for {}: {} assignments", reviewer_id, queue.len());
        Ok(queue)
    }

    /// Every reviewer with their active load, least loaded first.
    pub async fn reviewer_workload(&self, actor: &Actor) -> Result<Vec<Workload>> {
        actor.require_any(EDITORIAL, "Viewing reviewer workload")?;
        let mut conn = self.pool.acquire().await?;
        let loads = db::reviewer_loads(&mut conn, Role::Reviewer).await?;
        Ok(loads
            .into_iter()
            .map(|row| {
                let active = row.active.max(0) as usize;
                Workload {
                    reviewer_id: row.id,
                    name: row.name,
                    active,
                    available: is_available(active),
                }
            })
            .collect())
    }
}

/// Assignments are only visible to the reviewer they belong to.
async fn own_assignment(
    conn: &mut sqlx::SqliteConnection,
    actor: &Actor,
    assignment_id: &str,
) -> Result<ReviewAssignment> {
    match db::find_assignment(conn, assignment_id).await? {
        Some(a) if a.reviewer_id == actor.id => Ok(a),
        _ => Err(WorkflowError::not_found(format!("Assignment {}", assignment_id))),
    }
}
