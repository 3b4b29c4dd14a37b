use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{load_submission, to_corresponding_author, Workflow};
use crate::db;
use crate::domain::{excerpt, Actor, Decision, DecisionResult, ReviewSummary, Submission, EDITORIAL};
use crate::error::Result;
use crate::notify::NotificationKind;

impl Workflow {
    /// Appends an editorial decision and moves the submission to the status
    /// the result maps to. The author is notified after commit; a failed
    /// notification is logged and does not affect the decision.
    pub async fn record_decision(
        &self,
        actor: &Actor,
        submission_id: &str,
        result: DecisionResult,
        note: &str,
    ) -> Result<Submission> {
        actor.require_any(EDITORIAL, "Recording a decision")?;

        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        let mut submission = load_submission(&mut tx, submission_id).await?;
        let next = submission.status.transition(result.target_status())?;

        let summary = ReviewSummary::from_reviews(
            submission
                .review_assignments
                .iter()
                .filter_map(|a| a.review.as_ref()),
        );
        if result == DecisionResult::Accept && summary.completed == 0 {
            warn!(
                "Submission {} accepted by {} without any completed review",
                submission_id, actor.id
            );
        }
        if let Some(suggestion) = summary.suggestion.filter(|s| *s != result) {
            debug!(
                "Decision {:?} on {} differs from review consensus {:?} (mean score {:.1})",
                result,
                submission_id,
                suggestion,
                summary.mean_score.unwrap_or_default()
            );
        }

        let decision = Decision {
            id: Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            decided_by: actor.id.clone(),
            result,
            note: note.trim().to_string(),
            decided_at: now,
        };
        db::insert_decision(&mut tx, &decision).await?;

        submission.status = next;
        submission.decision_note = Some(decision.note.clone());
        submission.updated_at = now;
        db::update_submission_state(&mut tx, &submission).await?;
        let submission = load_submission(&mut tx, submission_id).await?;
        tx.commit().await?;

        info!(
            "Decision {:?} recorded on submission {} by {}",
            result, submission_id, actor.id
        );

        if let Some(notification) = to_corresponding_author(
            &submission,
            NotificationKind::DecisionRecorded,
            serde_json::json!({
                "result": result,
                "status": submission.status,
                "note": excerpt(&decision.note),
            }),
        ) {
            self.dispatcher.dispatch(notification);
        }
        Ok(submission)
    }
}
