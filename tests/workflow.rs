mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::*;
use paperflow::domain::{
    is_valid_email, AssignmentStatus, DecisionResult, FileKind, ListScope, Manuscript,
    ManuscriptPatch, Priority, Recommendation, ReviewInput, Role, Submission, SubmissionQuery,
    SubmissionStatus,
};
use paperflow::notify::NotificationKind;
use paperflow::workflow::{is_valid_serial, NewMember};
use paperflow::{ErrorKind, WorkflowError};

async fn submitted(fx: &Fixture) -> Submission {
    fx.wf
        .create_submission(&fx.author, complete_input(&fx.conference), true)
        .await
        .unwrap()
}

/// A submitted paper with the first reviewer assigned, ready for a decision.
async fn under_review(fx: &Fixture) -> Submission {
    let submission = submitted(fx).await;
    fx.wf
        .assign_reviewers(&fx.editor, &submission.id, &[fx.reviewers[0].id.clone()], None)
        .await
        .unwrap()
        .submission
}

fn review(score: i64, recommendation: &str) -> ReviewInput {
    ReviewInput {
        score,
        recommendation: recommendation.to_string(),
        comment_to_editor: "Confidential: borderline novelty.".to_string(),
        comment_to_author: "Please expand the evaluation.".to_string(),
    }
}

fn assignment_for(submission: &Submission, reviewer_id: &str) -> String {
    submission
        .review_assignments
        .iter()
        .find(|a| a.reviewer_id == reviewer_id)
        .map(|a| a.id.clone())
        .unwrap()
}

fn ids(actors: &[&paperflow::domain::Actor]) -> Vec<String> {
    actors.iter().map(|a| a.id.clone()).collect()
}

fn in_days(days: i64) -> Option<chrono::DateTime<Utc>> {
    Some(Utc::now() + Duration::days(days))
}

// Draft store and promotion

#[tokio::test]
async fn test_promote_moves_draft_into_submission() {
    let mut fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();
    fx.wf
        .attach_draft_file(&fx.author, &draft.id, FileKind::Manuscript, "paper.pdf", &pdf_bytes())
        .await
        .unwrap();

    let submission = fx.wf.promote_draft(&fx.author, &draft.id).await.unwrap();

    assert_eq!(submission.status, SubmissionStatus::Submitted);
    assert_eq!(submission.source_draft_id.as_deref(), Some(draft.id.as_str()));
    assert!(is_valid_serial(submission.serial_number.as_deref().unwrap()));
    assert!(submission.submitted_at.is_some());
    assert_eq!(submission.authors.len(), 2);
    assert_eq!(submission.corresponding_author().unwrap().email, "ada@example.org");

    let stored = fx.wf.get_submission(&fx.author, &submission.id).await.unwrap();
    assert_eq!(stored.files.len(), 1);
    assert_eq!(stored.files[0].version, 1);
    assert_eq!(stored.authors, submission.authors);

    let err = fx.wf.get_draft(&fx.author, &draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let note = next_notification(&mut fx.inbox).await;
    assert_eq!(note.kind, NotificationKind::SubmissionReceived);
    assert_eq!(note.recipient, "ada@example.org");
    assert_eq!(note.data["submission_id"], submission.id.as_str());
}

#[tokio::test]
async fn test_second_promotion_conflicts() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();
    fx.wf.promote_draft(&fx.author, &draft.id).await.unwrap();

    let err = fx.wf.promote_draft(&fx.author, &draft.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_promotions_yield_one_submission_and_one_conflict() {
    let fx = fixture_on_disk().await;

    for _ in 0..10 {
        let draft = fx
            .wf
            .create_draft(&fx.author, complete_input(&fx.conference))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            fx.wf.promote_draft(&fx.author, &draft.id),
            fx.wf.promote_draft(&fx.author, &draft.id),
        );
        let (ok, err) = match (first, second) {
            (Ok(s), Err(e)) | (Err(e), Ok(s)) => (s, e),
            other => panic!("expected one success and one failure, got {other:?}"),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict, "{err}");
        assert_eq!(ok.source_draft_id.as_deref(), Some(draft.id.as_str()));
    }

    let mine = fx
        .wf
        .list_submissions_for_actor(&fx.author, &SubmissionQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 10);
}

#[tokio::test]
async fn test_unknown_or_foreign_draft_is_not_found() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();

    let err = fx.wf.promote_draft(&fx.author, "missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fx
        .wf
        .promote_draft(&fx.other_author, &draft.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = fx.wf.get_draft(&fx.other_author, &draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_promotion_without_corresponding_author_is_rejected() {
    let fx = fixture().await;
    let mut input = complete_input(&fx.conference);
    input.authors = vec![coauthor("Ada Author", "ada@example.org")];
    let draft = fx.wf.create_draft(&fx.author, input).await.unwrap();

    let err = fx.wf.promote_draft(&fx.author, &draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(err.to_string().contains("corresponding author"));

    // Nothing moved: the draft is still there and no submission exists.
    assert!(fx.wf.get_draft(&fx.author, &draft.id).await.is_ok());
    let listed = fx
        .wf
        .list_submissions_for_actor(&fx.author, &SubmissionQuery::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_promotion_requires_all_agreements() {
    let fx = fixture().await;
    let mut input = complete_input(&fx.conference);
    input.agreements.consent_to_publish = false;
    let draft = fx.wf.create_draft(&fx.author, input).await.unwrap();

    let err = fx.wf.promote_draft(&fx.author, &draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn test_draft_rejects_two_corresponding_authors() {
    let fx = fixture().await;
    let mut input = complete_input(&fx.conference);
    input.authors[1].is_corresponding = true;

    let err = fx.wf.create_draft(&fx.author, input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn test_draft_accepts_incomplete_content_and_updates() {
    let fx = fixture().await;
    let mut input = complete_input(&fx.conference);
    input.title = String::new();
    input.authors.clear();
    let draft = fx.wf.create_draft(&fx.author, input).await.unwrap();

    let updated = fx
        .wf
        .update_draft(
            &fx.author,
            &draft.id,
            ManuscriptPatch {
                title: Some("  Late Title  ".to_string()),
                authors: Some(vec![ada()]),
                ..ManuscriptPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Late Title");
    assert_eq!(updated.authors.len(), 1);

    let err = fx
        .wf
        .update_draft(
            &fx.author,
            &draft.id,
            ManuscriptPatch {
                track: Some("Biology".to_string()),
                ..ManuscriptPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    fx.wf.delete_draft(&fx.author, &draft.id).await.unwrap();
    assert!(fx.wf.get_draft(&fx.author, &draft.id).await.is_err());
}

#[tokio::test]
async fn test_draft_requires_open_conference() {
    let fx = fixture().await;
    fx.wf
        .set_conference_active(&fx.chief, &fx.conference.id, false)
        .await
        .unwrap();

    let err = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn test_get_manuscript_distinguishes_drafts_and_submissions() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();
    let submission = submitted(&fx).await;

    let found = fx.wf.get_manuscript(&fx.author, &draft.id).await.unwrap();
    assert!(matches!(found, Manuscript::Draft(_)));
    let found = fx.wf.get_manuscript(&fx.author, &submission.id).await.unwrap();
    assert!(matches!(found, Manuscript::Submission(_)));
    assert_eq!(found.id(), submission.id);
}

// Lifecycle

#[tokio::test]
async fn test_direct_draft_submission_gets_serial_on_submit() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_submission(&fx.author, complete_input(&fx.conference), false)
        .await
        .unwrap();
    assert_eq!(draft.status, SubmissionStatus::Draft);
    assert!(draft.serial_number.is_none());

    let submission = fx.wf.submit(&fx.author, &draft.id).await.unwrap();
    assert_eq!(submission.status, SubmissionStatus::Submitted);
    assert!(is_valid_serial(submission.serial_number.as_deref().unwrap()));

    let err = fx.wf.submit(&fx.author, &draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_editing_accepted_submission_is_a_state_error() {
    let fx = fixture().await;
    let submission = under_review(&fx).await;
    fx.wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Accept, "Great.")
        .await
        .unwrap();

    let err = fx
        .wf
        .edit_submission(
            &fx.author,
            &submission.id,
            ManuscriptPatch {
                title: Some("New".to_string()),
                ..ManuscriptPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_edit_revalidates_authors() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_submission(&fx.author, complete_input(&fx.conference), false)
        .await
        .unwrap();

    let mut authors = draft.authors.clone();
    authors[1].is_corresponding = true;
    let err = fx
        .wf
        .edit_submission(
            &fx.author,
            &draft.id,
            ManuscriptPatch {
                authors: Some(authors),
                ..ManuscriptPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .edit_submission(&fx.other_author, &draft.id, ManuscriptPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_withdraw_then_delete() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;

    let err = fx
        .wf
        .delete_submission(&fx.author, &submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    let err = fx
        .wf
        .withdraw(&fx.other_author, &submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);

    let withdrawn = fx.wf.withdraw(&fx.author, &submission.id).await.unwrap();
    assert_eq!(withdrawn.status, SubmissionStatus::Withdrawn);

    let err = fx.wf.withdraw(&fx.author, &submission.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    fx.wf
        .delete_submission(&fx.author, &submission.id)
        .await
        .unwrap();
    let err = fx
        .wf
        .get_submission(&fx.author, &submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_revision_cycle_keeps_serial_and_decision_history() {
    let fx = fixture().await;
    let submission = under_review(&fx).await;
    let serial = submission.serial_number.clone();

    let revised = fx
        .wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Revise, "Tighten section 3.")
        .await
        .unwrap();
    assert_eq!(revised.status, SubmissionStatus::RevisionRequired);
    assert_eq!(revised.decision_note.as_deref(), Some("Tighten section 3."));

    fx.wf
        .attach_submission_file(
            &fx.author,
            &submission.id,
            FileKind::ResponseLetter,
            "response.txt",
            b"We tightened section 3.",
        )
        .await
        .unwrap();

    let resubmitted = fx.wf.resubmit(&fx.author, &submission.id).await.unwrap();
    assert_eq!(resubmitted.status, SubmissionStatus::Submitted);
    assert_eq!(resubmitted.serial_number, serial);

    let err = fx
        .wf
        .record_decision(&fx.chief, &submission.id, DecisionResult::Accept, "Thanks.")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
    fx.wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[&fx.reviewers[0]]), in_days(3))
        .await
        .unwrap();

    let accepted = fx
        .wf
        .record_decision(&fx.chief, &submission.id, DecisionResult::Accept, "Thanks.")
        .await
        .unwrap();
    assert_eq!(accepted.status, SubmissionStatus::Accepted);
    assert_eq!(accepted.decisions.len(), 2);
    assert_eq!(accepted.decisions[0].result, DecisionResult::Revise);
    assert_eq!(accepted.decisions[1].result, DecisionResult::Accept);
    assert_eq!(accepted.serial_number, serial);

    let err = fx.wf.resubmit(&fx.author, &submission.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_serial_collisions_are_retried() {
    let taken = "20250101000000-AAAAAA";
    let fx = fixture_with_serials(ScriptedSerials::new(&[
        taken,
        taken,
        taken,
        "20250101000000-BBBBBB",
    ]))
    .await;

    let first = submitted(&fx).await;
    let second = submitted(&fx).await;

    assert_eq!(first.serial_number.as_deref(), Some(taken));
    assert_eq!(second.serial_number.as_deref(), Some("20250101000000-BBBBBB"));
}

#[tokio::test]
async fn test_serial_allocation_gives_up_with_conflict() {
    let taken = "20250101000000-AAAAAA";
    let fx = fixture_with_serials(ScriptedSerials::new(&[taken; 10])).await;
    submitted(&fx).await;

    let err = fx
        .wf
        .create_submission(&fx.author, complete_input(&fx.conference), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// Files

#[tokio::test]
async fn test_file_versions_increase_per_kind() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();

    let v1 = fx
        .wf
        .attach_draft_file(&fx.author, &draft.id, FileKind::Manuscript, "paper.pdf", &pdf_bytes())
        .await
        .unwrap();
    let v2 = fx
        .wf
        .attach_draft_file(
            &fx.author,
            &draft.id,
            FileKind::Manuscript,
            "paper-v2.pdf",
            &pdf_bytes(),
        )
        .await
        .unwrap();
    let extra = fx
        .wf
        .attach_draft_file(
            &fx.author,
            &draft.id,
            FileKind::Supplementary,
            "data.csv",
            b"a,b\n1,2\n",
        )
        .await
        .unwrap();

    assert_eq!((v1.version, v2.version, extra.version), (1, 2, 1));
    assert_eq!(v1.mime, "application/pdf");
    assert_eq!(v1.checksum.len(), 64);
    assert!(std::path::Path::new(&v2.path).starts_with(fx.uploads.path()));
    assert_eq!(std::fs::read(&v2.path).unwrap(), pdf_bytes());
}

#[tokio::test]
async fn test_upload_gating() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();

    let err = fx
        .wf
        .attach_draft_file(&fx.author, &draft.id, FileKind::Manuscript, "paper.docx", b"PK")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .attach_draft_file(&fx.author, &draft.id, FileKind::Manuscript, "paper.pdf", b"")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .attach_draft_file(&fx.author, &draft.id, FileKind::CameraReady, "final.pdf", &pdf_bytes())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_camera_ready_only_after_acceptance() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;

    let err = fx
        .wf
        .attach_submission_file(
            &fx.author,
            &submission.id,
            FileKind::CameraReady,
            "final.pdf",
            &pdf_bytes(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    let err = fx
        .wf
        .attach_submission_file(
            &fx.author,
            &submission.id,
            FileKind::Manuscript,
            "paper.pdf",
            &pdf_bytes(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    fx.wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[&fx.reviewers[0]]), None)
        .await
        .unwrap();
    fx.wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Accept, "")
        .await
        .unwrap();
    let asset = fx
        .wf
        .attach_submission_file(
            &fx.author,
            &submission.id,
            FileKind::CameraReady,
            "final.pdf",
            &pdf_bytes(),
        )
        .await
        .unwrap();
    assert_eq!(asset.version, 1);
}

// Reviewer allocation

#[tokio::test]
async fn test_assign_reviewers_moves_to_under_review() {
    let mut fx = fixture().await;
    let submission = submitted(&fx).await;

    let outcome = fx
        .wf
        .assign_reviewers(
            &fx.editor,
            &submission.id,
            &ids(&[&fx.reviewers[0], &fx.reviewers[1]]),
            in_days(7),
        )
        .await
        .unwrap();

    assert_eq!(outcome.submission.status, SubmissionStatus::UnderReview);
    assert_eq!(outcome.created.len(), 2);
    assert!(outcome.updated.is_empty());
    assert_eq!(outcome.submission.review_assignments.len(), 2);
    assert!(outcome
        .submission
        .review_assignments
        .iter()
        .all(|a| a.status == AssignmentStatus::Pending && a.due_at.is_some()));

    let mut recipients = vec![
        next_of_kind(&mut fx.inbox, NotificationKind::ReviewRequested).await,
        next_of_kind(&mut fx.inbox, NotificationKind::ReviewRequested).await,
    ];
    recipients.sort_by(|a, b| a.recipient.cmp(&b.recipient));
    assert_eq!(recipients[0].recipient, "r1@example.org");
    assert_eq!(recipients[1].recipient, "r2@example.org");
}

#[tokio::test]
async fn test_reassignment_updates_in_place() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;
    let reviewer = ids(&[&fx.reviewers[0]]);

    let first = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &reviewer, in_days(7))
        .await
        .unwrap();
    let second = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &reviewer, in_days(14))
        .await
        .unwrap();

    assert_eq!(second.created.len(), 0);
    assert_eq!(second.updated, reviewer);
    assert_eq!(second.submission.status, SubmissionStatus::UnderReview);
    assert_eq!(second.submission.review_assignments.len(), 1);
    let before = &first.submission.review_assignments[0];
    let after = &second.submission.review_assignments[0];
    assert_eq!(before.id, after.id);
    assert!(after.due_at > before.due_at);
}

#[tokio::test]
async fn test_declined_reviewer_returns_to_pending_on_reassignment() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;
    let reviewer = &fx.reviewers[0];
    let outcome = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), None)
        .await
        .unwrap();
    let assignment_id = assignment_for(&outcome.submission, &reviewer.id);

    let declined = fx
        .wf
        .respond_to_assignment(reviewer, &assignment_id, false)
        .await
        .unwrap();
    assert_eq!(declined.status, AssignmentStatus::Declined);

    let err = fx
        .wf
        .submit_review(reviewer, &assignment_id, review(6, "ACCEPT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    let again = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), None)
        .await
        .unwrap();
    assert_eq!(again.submission.review_assignments[0].status, AssignmentStatus::Pending);
}

#[tokio::test]
async fn test_assignment_requires_editorial_role_and_valid_reviewers() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;

    let err = fx
        .wf
        .assign_reviewers(&fx.author, &submission.id, &ids(&[&fx.reviewers[0]]), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);

    let err = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[&fx.other_author]), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &["ghost".to_string()], None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &[], None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .assign_reviewers(
            &fx.editor,
            &submission.id,
            &ids(&[&fx.reviewers[0]]),
            Some(Utc::now() - Duration::days(1)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    // Nothing was written by the failed attempts.
    let unchanged = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    assert_eq!(unchanged.status, SubmissionStatus::Submitted);
    assert!(unchanged.review_assignments.is_empty());
}

#[tokio::test]
async fn test_creator_cannot_review_own_paper() {
    let fx = fixture().await;
    fx.wf
        .set_roles(&fx.chief, &fx.author.id, &[Role::Author, Role::Reviewer])
        .await
        .unwrap();
    let submission = submitted(&fx).await;

    let err = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[&fx.author]), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn test_assigning_draft_or_decided_submission_is_a_state_error() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_submission(&fx.author, complete_input(&fx.conference), false)
        .await
        .unwrap();
    let err = fx
        .wf
        .assign_reviewers(&fx.editor, &draft.id, &ids(&[&fx.reviewers[0]]), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);

    let submission = under_review(&fx).await;
    fx.wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Reject, "Out of scope.")
        .await
        .unwrap();
    let err = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[&fx.reviewers[0]]), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_overloaded_reviewer_is_reported_not_blocked() {
    let fx = fixture().await;
    let reviewer = &fx.reviewers[0];

    let mut last = None;
    for _ in 0..4 {
        let submission = submitted(&fx).await;
        last = Some(
            fx.wf
                .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), None)
                .await
                .unwrap(),
        );
    }
    let last = last.unwrap();
    assert_eq!(last.overloaded, vec![reviewer.id.clone()]);

    let workload = fx.wf.reviewer_workload(&fx.editor).await.unwrap();
    let entry = workload.iter().find(|w| w.reviewer_id == reviewer.id).unwrap();
    assert_eq!(entry.active, 4);
    assert!(!entry.available);
    let idle = workload
        .iter()
        .find(|w| w.reviewer_id == fx.reviewers[1].id)
        .unwrap();
    assert!(idle.available);

    let err = fx.wf.reviewer_workload(&fx.author).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);
}

#[tokio::test]
async fn test_closed_submissions_release_reviewer_capacity() {
    let fx = fixture().await;
    let reviewer = &fx.reviewers[0];

    let mut assigned = Vec::new();
    for days in [2, 5, 20] {
        let submission = submitted(&fx).await;
        fx.wf
            .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), in_days(days))
            .await
            .unwrap();
        assigned.push(submission.id);
    }
    let load = |workload: &[paperflow::domain::Workload]| {
        workload
            .iter()
            .find(|w| w.reviewer_id == reviewer.id)
            .map(|w| (w.active, w.available))
            .unwrap()
    };
    assert_eq!(load(&fx.wf.reviewer_workload(&fx.editor).await.unwrap()), (3, false));

    fx.wf
        .record_decision(&fx.editor, &assigned[0], DecisionResult::Reject, "Out of scope.")
        .await
        .unwrap();
    fx.wf.withdraw(&fx.author, &assigned[1]).await.unwrap();

    assert_eq!(load(&fx.wf.reviewer_workload(&fx.editor).await.unwrap()), (1, true));

    let queue = fx
        .wf
        .list_assignments_for_reviewer(reviewer, None)
        .await
        .unwrap();
    assert_eq!(queue.len(), 3);
    assert!(queue[0].active);
    assert_eq!(queue[0].submission_id, assigned[2]);
    assert!(queue[1..].iter().all(|e| !e.active));
    assert_eq!(queue[1].status, AssignmentStatus::Pending);
}

// Reviews

#[tokio::test]
async fn test_review_can_only_be_submitted_once() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;
    let reviewer = &fx.reviewers[0];
    let outcome = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), in_days(5))
        .await
        .unwrap();
    let assignment_id = assignment_for(&outcome.submission, &reviewer.id);

    let done = fx
        .wf
        .submit_review(reviewer, &assignment_id, review(8, "minor_revision"))
        .await
        .unwrap();
    assert_eq!(done.status, AssignmentStatus::Submitted);
    let first = done.review.clone().unwrap();
    assert_eq!(first.recommendation, Recommendation::MinorRevision);

    let err = fx
        .wf
        .submit_review(reviewer, &assignment_id, review(2, "REJECT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    assert_eq!(stored.review_assignments[0].review.as_ref(), Some(&first));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_reviews_keep_the_first_and_conflict_the_second() {
    let fx = fixture_on_disk().await;
    let reviewer = &fx.reviewers[0];

    for _ in 0..10 {
        let submission = submitted(&fx).await;
        let outcome = fx
            .wf
            .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), in_days(5))
            .await
            .unwrap();
        let assignment_id = assignment_for(&outcome.submission, &reviewer.id);

        let (first, second) = tokio::join!(
            fx.wf.submit_review(reviewer, &assignment_id, review(7, "ACCEPT")),
            fx.wf.submit_review(reviewer, &assignment_id, review(3, "REJECT")),
        );
        let (done, err) = match (first, second) {
            (Ok(a), Err(e)) | (Err(e), Ok(a)) => (a, e),
            other => panic!("expected one success and one failure, got {other:?}"),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict, "{err}");

        let stored = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
        assert_eq!(stored.review_assignments[0].review, done.review);
    }
}

#[tokio::test]
async fn test_review_input_is_validated() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;
    let reviewer = &fx.reviewers[0];
    let outcome = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), None)
        .await
        .unwrap();
    let assignment_id = assignment_for(&outcome.submission, &reviewer.id);

    let err = fx
        .wf
        .submit_review(reviewer, &assignment_id, review(7, "STRONG_ACCEPT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .submit_review(reviewer, &assignment_id, review(0, "ACCEPT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = fx
        .wf
        .submit_review(&fx.reviewers[1], &assignment_id, review(7, "ACCEPT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let stored = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    assert!(stored.review_assignments[0].review.is_none());
}

#[tokio::test]
async fn test_authors_never_see_comments_to_editor() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;
    let reviewer = &fx.reviewers[0];
    let outcome = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), None)
        .await
        .unwrap();
    let assignment_id = assignment_for(&outcome.submission, &reviewer.id);
    fx.wf
        .submit_review(reviewer, &assignment_id, review(6, "MAJOR_REVISION"))
        .await
        .unwrap();

    let as_author = fx.wf.get_submission(&fx.author, &submission.id).await.unwrap();
    let seen = as_author.review_assignments[0].review.as_ref().unwrap();
    assert!(seen.comment_to_editor.is_empty());
    assert_eq!(seen.comment_to_author, "Please expand the evaluation.");

    let as_editor = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    let seen = as_editor.review_assignments[0].review.as_ref().unwrap();
    assert_eq!(seen.comment_to_editor, "Confidential: borderline novelty.");

    let err = fx
        .wf
        .get_submission(&fx.other_author, &submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(fx.wf.get_submission(reviewer, &submission.id).await.is_ok());
}

#[tokio::test]
async fn test_reviewer_queue_is_ordered_by_priority() {
    let fx = fixture().await;
    let reviewer = &fx.reviewers[0];
    let mut by_due = Vec::new();
    for days in [20, 2, 5] {
        let submission = submitted(&fx).await;
        fx.wf
            .assign_reviewers(&fx.editor, &submission.id, &ids(&[reviewer]), in_days(days))
            .await
            .unwrap();
        by_due.push((days, submission.id));
    }

    let queue = fx
        .wf
        .list_assignments_for_reviewer(reviewer, None)
        .await
        .unwrap();
    let priorities: Vec<Priority> = queue.iter().map(|e| e.priority).collect();
    assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    assert_eq!(queue[0].submission_id, by_due[1].1);
    assert_eq!(queue[2].submission_id, by_due[0].1);

    let as_editor = fx
        .wf
        .list_assignments_for_reviewer(&fx.editor, Some(&reviewer.id))
        .await
        .unwrap();
    assert_eq!(as_editor.len(), 3);

    let err = fx
        .wf
        .list_assignments_for_reviewer(&fx.reviewers[1], Some(&reviewer.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);
}

// Decisions

#[tokio::test]
async fn test_reject_decision_appends_row() {
    let mut fx = fixture().await;
    let submission = under_review(&fx).await;

    let rejected = fx
        .wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Reject, "Out of scope.")
        .await
        .unwrap();

    assert_eq!(rejected.status, SubmissionStatus::Rejected);
    assert_eq!(rejected.decisions.len(), 1);
    assert_eq!(rejected.decisions[0].decided_by, fx.editor.id);
    assert_eq!(rejected.decisions[0].note, "Out of scope.");

    let note = next_of_kind(&mut fx.inbox, NotificationKind::DecisionRecorded).await;
    assert_eq!(note.recipient, "ada@example.org");
    assert_eq!(note.data["result"], "REJECT");
    assert_eq!(note.data["note"], "Out of scope.");

    let err = fx
        .wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Accept, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateError);
}

#[tokio::test]
async fn test_accept_without_reviews_is_allowed() {
    let fx = fixture().await;
    let submission = under_review(&fx).await;

    let accepted = fx
        .wf
        .record_decision(&fx.chief, &submission.id, DecisionResult::Accept, "Invited paper.")
        .await
        .unwrap();
    assert_eq!(accepted.status, SubmissionStatus::Accepted);
    assert_eq!(accepted.completed_reviews(), 0);
}

#[tokio::test]
async fn test_decision_before_review_is_a_state_error() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;

    for result in [DecisionResult::Accept, DecisionResult::Revise, DecisionResult::Reject] {
        let err = fx
            .wf
            .record_decision(&fx.editor, &submission.id, result, "Too early.")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateError);
    }

    let unchanged = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    assert_eq!(unchanged.status, SubmissionStatus::Submitted);
    assert!(unchanged.decisions.is_empty());
    assert!(unchanged.decision_note.is_none());
}

#[tokio::test]
async fn test_decision_requires_editorial_role() {
    let fx = fixture().await;
    let submission = submitted(&fx).await;

    let err = fx
        .wf
        .record_decision(&fx.reviewers[0], &submission.id, DecisionResult::Accept, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);

    let unchanged = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    assert!(unchanged.decisions.is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_decision() {
    let fx = fixture_with_notifier(Arc::new(FailingNotifier)).await;
    let submission = under_review(&fx).await;

    let decided = fx
        .wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Revise, "Minor fixes.")
        .await
        .unwrap();
    assert_eq!(decided.status, SubmissionStatus::RevisionRequired);

    tokio::task::yield_now().await;
    let stored = fx.wf.get_submission(&fx.editor, &submission.id).await.unwrap();
    assert_eq!(stored.decisions.len(), 1);
}

#[tokio::test]
async fn test_full_review_cycle() {
    let fx = fixture().await;
    let draft = fx
        .wf
        .create_draft(&fx.author, complete_input(&fx.conference))
        .await
        .unwrap();
    let submission = fx.wf.promote_draft(&fx.author, &draft.id).await.unwrap();

    let (r1, r2) = (&fx.reviewers[0], &fx.reviewers[1]);
    let outcome = fx
        .wf
        .assign_reviewers(&fx.editor, &submission.id, &ids(&[r1, r2]), in_days(7))
        .await
        .unwrap();

    for (reviewer, rec) in [(r1, "ACCEPT"), (r2, "MINOR_REVISION")] {
        let id = assignment_for(&outcome.submission, &reviewer.id);
        fx.wf.respond_to_assignment(reviewer, &id, true).await.unwrap();
        fx.wf.submit_review(reviewer, &id, review(8, rec)).await.unwrap();
    }

    let accepted = fx
        .wf
        .record_decision(&fx.editor, &submission.id, DecisionResult::Accept, "Congratulations.")
        .await
        .unwrap();
    assert_eq!(accepted.status, SubmissionStatus::Accepted);
    assert_eq!(accepted.completed_reviews(), 2);
    assert!(accepted
        .review_assignments
        .iter()
        .all(|a| a.status == AssignmentStatus::Submitted));
}

// Listing

#[tokio::test]
async fn test_listing_scopes_and_filters() {
    let fx = fixture().await;
    let first = submitted(&fx).await;
    let mut input = complete_input(&fx.conference);
    input.title = "Lock-free Queues Revisited".to_string();
    let second = fx.wf.create_submission(&fx.author, input, true).await.unwrap();
    fx.wf
        .assign_reviewers(&fx.editor, &second.id, &ids(&[&fx.reviewers[0]]), None)
        .await
        .unwrap();

    let mine = fx
        .wf
        .list_submissions_for_actor(&fx.author, &SubmissionQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|s| s.year == YEAR));

    let found = fx
        .wf
        .list_submissions_for_actor(
            &fx.author,
            &SubmissionQuery::default().with_search("LOCK-FREE"),
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, second.id);

    let serial = first.serial_number.clone().unwrap();
    let by_serial = fx
        .wf
        .list_submissions_for_actor(
            &fx.author,
            &SubmissionQuery::default().with_search(&serial[15..]),
        )
        .await
        .unwrap();
    assert_eq!(by_serial.len(), 1);
    assert_eq!(by_serial[0].id, first.id);

    let reviewing = fx
        .wf
        .list_submissions_for_actor(&fx.reviewers[0], &SubmissionQuery::scope(ListScope::Reviewing))
        .await
        .unwrap();
    assert_eq!(reviewing.len(), 1);
    assert_eq!(reviewing[0].status, SubmissionStatus::UnderReview);

    let editorial = fx
        .wf
        .list_submissions_for_actor(
            &fx.editor,
            &SubmissionQuery::scope(ListScope::Editorial).with_status(SubmissionStatus::Submitted),
        )
        .await
        .unwrap();
    assert_eq!(editorial.len(), 1);
    assert_eq!(editorial[0].id, first.id);

    let none = fx
        .wf
        .list_submissions_for_actor(
            &fx.editor,
            &SubmissionQuery::scope(ListScope::Editorial).with_year(1999),
        )
        .await
        .unwrap();
    assert!(none.is_empty());

    let err = fx
        .wf
        .list_submissions_for_actor(&fx.author, &SubmissionQuery::scope(ListScope::Editorial))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);
}

// Members and conferences

#[tokio::test]
async fn test_last_chief_editor_cannot_be_removed() {
    let fx = fixture().await;

    let err = fx
        .wf
        .set_roles(&fx.chief, &fx.chief.id, &[Role::Editor])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyError);

    let err = fx.wf.delete_member(&fx.chief, &fx.chief.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyError);

    let second = member(
        &fx.wf,
        &fx.chief,
        "Second Chief",
        "chief2@example.org",
        &[Role::ChiefEditor],
    )
    .await;
    let third = member(
        &fx.wf,
        &fx.chief,
        "Third Chief",
        "chief3@example.org",
        &[Role::ChiefEditor],
    )
    .await;

    fx.wf.delete_member(&fx.chief, &third.id).await.unwrap();
    assert!(fx.wf.resolve_actor(&third.id).await.unwrap().is_none());

    let demoted = fx
        .wf
        .set_roles(&second, &fx.chief.id, &[Role::Editor])
        .await
        .unwrap();
    assert!(!demoted.roles.contains(&Role::ChiefEditor));

    let err = fx.wf.delete_member(&second, &second.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyError);
}

#[tokio::test]
async fn test_member_management_rules() {
    let fx = fixture().await;

    let err = fx.wf.sign_up("Ada Again", "ADA@example.org").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyError);

    let err = fx.wf.sign_up("Nobody", "not-an-email").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let signed = fx.wf.sign_up("Dana New", "dana@example.org").await.unwrap();
    assert!(signed.roles.contains(&Role::Author));
    assert!(is_valid_email(&signed.email));

    let err = fx
        .wf
        .register_member(
            &fx.editor,
            NewMember {
                name: "X".to_string(),
                email: "x@example.org".to_string(),
                roles: vec![Role::Reviewer],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);

    let admin = member(&fx.wf, &fx.chief, "Ann Admin", "admin@example.org", &[Role::Admin]).await;
    let err = fx
        .wf
        .set_roles(&admin, &fx.editor.id, &[Role::ChiefEditor])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);

    fx.wf.delete_member(&admin, &signed.id).await.unwrap();
    let err = fx.wf.member(&signed.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_member_with_history_cannot_be_deleted() {
    let fx = fixture().await;
    submitted(&fx).await;

    let err = fx.wf.delete_member(&fx.chief, &fx.author.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyError);
}

#[tokio::test]
async fn test_conference_registry() {
    let fx = fixture().await;

    let found = fx.wf.conference_for_year(YEAR).await.unwrap();
    assert_eq!(found.id, fx.conference.id);
    assert!(found.has_track(TRACK));

    let err = fx
        .wf
        .register_conference(
            &fx.chief,
            paperflow::workflow::NewConference {
                name: "Duplicate".to_string(),
                year: YEAR,
                tracks: vec![],
                is_active: true,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyError);

    let err = fx.wf.conference_for_year(1990).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fx
        .wf
        .set_conference_active(&fx.author, &fx.conference.id, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionError);
}
