use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::conferences::open_conference;
use super::drafts::gate_upload;
use super::serial;
use super::{can_view, load_submission, require_creator, to_corresponding_author, Workflow};
use crate::db::{self, Owner};
use crate::domain::{
    next_version, validate_authors, validate_for_submission, Actor, FileAsset, FileKind,
    ListScope, Manuscript, ManuscriptInput, ManuscriptPatch, Role, Submission, SubmissionQuery,
    SubmissionStatus, SubmissionSummary, EDITORIAL,
};
use crate::error::{Result, WorkflowError};
use crate::notify::NotificationKind;
use crate::storage::FileMetadata;

impl Workflow {
    /// Turns a draft into a SUBMITTED submission.
    ///
    /// Authors and files move over, a serial number is allocated and the
    /// draft is deleted, all in one transaction. A draft that was already
    /// promoted yields a conflict.
    pub async fn promote_draft(&self, actor: &Actor, draft_id: &str) -> Result<Submission> {
        actor.require_any(&[Role::Author], "Submitting a manuscript")?;

        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;

        let draft = match db::find_draft(&mut tx, draft_id).await? {
            Some(draft) if draft.created_by == actor.id => draft,
            Some(_) => return Err(WorkflowError::not_found(format!("Draft {}", draft_id))),
            None => {
                if db::submission_for_draft(&mut tx, draft_id).await?.is_some() {
                    return Err(WorkflowError::conflict(format!(
                        "Draft {} has already been submitted",
                        draft_id
                    )));
                }
                return Err(WorkflowError::not_found(format!("Draft {}", draft_id)));
            }
        };

        draft.validate_for_submission()?;
        open_conference(&mut tx, &draft.conference_id, &draft.track).await?;

        let serial = serial::allocate(&mut tx, self.serials.as_ref(), now).await?;
        let submission = draft.into_submission(Uuid::new_v4().to_string(), serial, now);

        db::insert_submission(&mut tx, &submission).await?;
        db::delete_draft(&mut tx, draft_id).await?;
        tx.commit().await?;

        info!(
            "Draft {} promoted to submission {} ({})",
            draft_id,
            submission.id,
            submission.serial_number.as_deref().unwrap_or_default()
        );
        self.notify_received(&submission);
        Ok(submission)
    }

    /// Creates a submission without going through the draft store, either
    /// as DRAFT or directly as SUBMITTED.
    pub async fn create_submission(
        &self,
        actor: &Actor,
        input: ManuscriptInput,
        submit_now: bool,
    ) -> Result<Submission> {
        actor.require_any(&[Role::Author], "Creating a submission")?;
        if input.title.trim().is_empty() {
            return Err(WorkflowError::validation("Title is required"));
        }
        validate_authors(&input.authors, true)?;
        if submit_now {
            validate_for_submission(
                &input.title,
                &input.abstract_text,
                &input.track,
                &input.authors,
                &input.agreements,
            )?;
        }

        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        open_conference(&mut tx, &input.conference_id, &input.track).await?;

        let (status, serial_number, submitted_at) = if submit_now {
            let serial = serial::allocate(&mut tx, self.serials.as_ref(), now).await?;
            (SubmissionStatus::Submitted, Some(serial), Some(now))
        } else {
            (SubmissionStatus::Draft, None, None)
        };

        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            conference_id: input.conference_id,
            created_by: actor.id.clone(),
            source_draft_id: None,
            title: input.title.trim().to_string(),
            abstract_text: input.abstract_text,
            track: input.track,
            paper_type: input.paper_type,
            keywords: input.keywords,
            agreements: input.agreements,
            status,
            serial_number,
            submitted_at,
            decision_note: None,
            authors: input.authors,
            files: Vec::new(),
            review_assignments: Vec::new(),
            decisions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        db::insert_submission(&mut tx, &submission).await?;
        tx.commit().await?;

        info!("Submission {} created by {} as {}", submission.id, actor.id, status);
        if submit_now {
            self.notify_received(&submission);
        }
        Ok(submission)
    }

    /// DRAFT -> SUBMITTED. Allocates the serial number on first submission.
    pub async fn submit(&self, actor: &Actor, id: &str) -> Result<Submission> {
        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        let mut submission = load_submission(&mut tx, id).await?;
        require_creator(actor, &submission, "submit it")?;

        let next = submission.status.transition(SubmissionStatus::Submitted)?;
        validate_for_submission(
            &submission.title,
            &submission.abstract_text,
            &submission.track,
            &submission.authors,
            &submission.agreements,
        )?;
        open_conference(&mut tx, &submission.conference_id, &submission.track).await?;

        if submission.serial_number.is_none() {
            submission.serial_number =
                Some(serial::allocate(&mut tx, self.serials.as_ref(), now).await?);
        }
        submission.status = next;
        submission.submitted_at = Some(now);
        submission.updated_at = now;
        db::update_submission_state(&mut tx, &submission).await?;
        let submission = load_submission(&mut tx, id).await?;
        tx.commit().await?;

        info!("Submission {} submitted", id);
        self.notify_received(&submission);
        Ok(submission)
    }

    /// Edits content while the submission is DRAFT or REVISION_REQUIRED.
    /// Only the creator may edit; anything else is a state error.
    pub async fn edit_submission(
        &self,
        actor: &Actor,
        id: &str,
        patch: ManuscriptPatch,
    ) -> Result<Submission> {
        let mut tx = db::begin_write(&self.pool).await?;
        let mut submission = load_submission(&mut tx, id).await?;

        if submission.created_by != actor.id {
            return Err(WorkflowError::state(format!(
                "Submission {} can only be edited by its creator",
                id
            )));
        }
        if !submission.status.is_editable() {
            return Err(WorkflowError::state(format!(
                "Submission {} cannot be edited while {}",
                id, submission.status
            )));
        }

        if let Some(authors) = patch.authors {
            validate_authors(&authors, true)?;
            submission.authors = authors;
        }
        if let Some(track) = patch.track {
            open_conference(&mut tx, &submission.conference_id, &track).await?;
            submission.track = track;
        }
        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(WorkflowError::validation("Title is required"));
            }
            submission.title = title.trim().to_string();
        }
        if let Some(abstract_text) = patch.abstract_text {
            submission.abstract_text = abstract_text;
        }
        if let Some(paper_type) = patch.paper_type {
            submission.paper_type = paper_type;
        }
        if let Some(keywords) = patch.keywords {
            submission.keywords = keywords;
        }
        if let Some(agreements) = patch.agreements {
            submission.agreements = agreements;
        }
        submission.updated_at = Utc::now();

        db::update_submission_content(&mut tx, &submission).await?;
        let submission = load_submission(&mut tx, id).await?;
        tx.commit().await?;

        info!("Submission {} edited", id);
        Ok(submission)
    }

    /// REVISION_REQUIRED -> SUBMITTED. The serial number is kept.
    pub async fn resubmit(&self, actor: &Actor, id: &str) -> Result<Submission> {
        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        let mut submission = load_submission(&mut tx, id).await?;
        require_creator(actor, &submission, "resubmit it")?;

        if submission.status != SubmissionStatus::RevisionRequired {
            return Err(WorkflowError::state(format!(
                "Only submissions awaiting revision can be resubmitted, {} is {}",
                id, submission.status
            )));
        }
        submission.status = submission.status.transition(SubmissionStatus::Submitted)?;
        validate_authors(&submission.authors, true)?;
        submission.submitted_at = Some(now);
        submission.updated_at = now;
        db::update_submission_state(&mut tx, &submission).await?;
        let submission = load_submission(&mut tx, id).await?;
        tx.commit().await?;

        info!("Submission {} resubmitted after revision", id);
        self.notify_received(&submission);
        Ok(submission)
    }

    pub async fn withdraw(&self, actor: &Actor, id: &str) -> Result<Submission> {
        let mut tx = db::begin_write(&self.pool).await?;
        let mut submission = load_submission(&mut tx, id).await?;
        require_creator(actor, &submission, "withdraw it")?;

        submission.status = submission.status.transition(SubmissionStatus::Withdrawn)?;
        submission.updated_at = Utc::now();
        db::update_submission_state(&mut tx, &submission).await?;
        let submission = load_submission(&mut tx, id).await?;
        tx.commit().await?;

        info!("Submission {} withdrawn", id);
        Ok(submission)
    }

    /// Removes a DRAFT or WITHDRAWN submission with everything attached to it.
    pub async fn delete_submission(&self, actor: &Actor, id: &str) -> Result<()> {
        let mut tx = db::begin_write(&self.pool).await?;
        let submission = load_submission(&mut tx, id).await?;
        require_creator(actor, &submission, "delete it")?;

        if !submission.status.is_deletable() {
            return Err(WorkflowError::state(format!(
                "Submission {} cannot be deleted while {}",
                id, submission.status
            )));
        }
        db::delete_submission(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            "Submission {} deleted by {} ({} stored files left on disk)",
            id,
            actor.id,
            submission.files.len()
        );
        Ok(())
    }

    /// Stores a new file version on a submission.
    ///
    /// Camera-ready files need an ACCEPTED submission; every other kind needs
    /// an editable one.
    pub async fn attach_submission_file(
        &self,
        actor: &Actor,
        id: &str,
        kind: FileKind,
        filename: &str,
        bytes: &[u8],
    ) -> Result<FileAsset> {
        let mime = gate_upload(kind, filename, bytes)?;

        let mut tx = db::begin_write(&self.pool).await?;
        let submission = load_submission(&mut tx, id).await?;
        require_creator(actor, &submission, "upload files")?;

        let allowed = match kind {
            FileKind::CameraReady => submission.status == SubmissionStatus::Accepted,
            _ => submission.status.is_editable(),
        };
        if !allowed {
            return Err(WorkflowError::state(format!(
                "Cannot upload {:?} files while submission is {}",
                kind, submission.status
            )));
        }

        let version = next_version(&submission.files, kind);
        let stored = self.files.persist(
            bytes,
            &FileMetadata {
                owner_id: id.to_string(),
                kind,
                version,
                filename: filename.to_string(),
            },
        )?;
        let asset = FileAsset {
            kind,
            version,
            path: stored.path,
            checksum: stored.checksum,
            size: stored.size,
            mime,
            uploaded_at: Utc::now(),
        };
        db::insert_file(&mut tx, Owner::Submission, id, &asset).await?;
        tx.commit().await?;

        info!("Submission {} file {:?} v{} stored", id, kind, version);
        Ok(asset)
    }

    /// A submission as `actor` may see it. Non-editorial viewers never get
    /// comments addressed to the editor.
    pub async fn get_submission(&self, actor: &Actor, id: &str) -> Result<Submission> {
        let mut conn = self.pool.acquire().await?;
        let submission = load_submission(&mut conn, id).await?;
        if !can_view(actor, &submission) {
            return Err(WorkflowError::not_found(format!("Submission {}", id)));
        }
        if actor.is_editorial() {
            Ok(submission)
        } else {
            Ok(submission.redact_for_author())
        }
    }

    /// Looks the id up in the draft store first, then among submissions.
    pub async fn get_manuscript(&self, actor: &Actor, id: &str) -> Result<Manuscript> {
        match self.get_draft(actor, id).await {
            Ok(draft) => Ok(Manuscript::Draft(draft)),
            Err(WorkflowError::NotFound(_)) => {
                self.get_submission(actor, id).await.map(Manuscript::Submission)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_submissions_for_actor(
        &self,
        actor: &Actor,
        query: &SubmissionQuery,
    ) -> Result<Vec<SubmissionSummary>> {
        if query.scope == ListScope::Editorial {
            actor.require_any(EDITORIAL, "Listing all submissions")?;
        }
        let mut conn = self.pool.acquire().await?;
        let rows = db::list_submissions(&mut conn, &actor.id, query).await?;
        debug!("Listed {} submissions for {} ({:?})", rows.len(), actor.id, query.scope);
        Ok(rows)
    }

    fn notify_received(&self, submission: &Submission) {
        if let Some(notification) = to_corresponding_author(
            submission,
            NotificationKind::SubmissionReceived,
            serde_json::json!({ "status": submission.status }),
        ) {
            self.dispatcher.dispatch(notification);
        }
    }
}
