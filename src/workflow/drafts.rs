use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use super::conferences::open_conference;
use super::Workflow;
use crate::db::{self, Owner};
use crate::domain::{
    next_version, validate_authors, Actor, Draft, FileAsset, FileKind, ManuscriptInput,
    ManuscriptPatch, Role,
};
use crate::error::{Result, WorkflowError};
use crate::storage::{detect_mime, FileMetadata};

/// Drafts are private: anyone but the creator is told it does not exist.
async fn owned_draft(conn: &mut SqliteConnection, actor: &Actor, id: &str) -> Result<Draft> {
    match db::find_draft(conn, id).await? {
        Some(draft) if draft.created_by == actor.id => Ok(draft),
        _ => Err(WorkflowError::not_found(format!("Draft {}", id))),
    }
}

impl Workflow {
    pub async fn create_draft(&self, actor: &Actor, input: ManuscriptInput) -> Result<Draft> {
        actor.require_any(&[Role::Author], "Creating a draft")?;
        validate_authors(&input.authors, false)?;

        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        open_conference(&mut tx, &input.conference_id, &input.track).await?;

        let draft = Draft {
            id: Uuid::new_v4().to_string(),
            conference_id: input.conference_id,
            created_by: actor.id.clone(),
            title: input.title.trim().to_string(),
            abstract_text: input.abstract_text,
            track: input.track,
            paper_type: input.paper_type,
            keywords: input.keywords,
            agreements: input.agreements,
            authors: input.authors,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        db::insert_draft(&mut tx, &draft).await?;
        tx.commit().await?;

        info!("Draft {} created by {}", draft.id, actor.id);
        Ok(draft)
    }

    pub async fn get_draft(&self, actor: &Actor, id: &str) -> Result<Draft> {
        let mut conn = self.pool.acquire().await?;
        owned_draft(&mut conn, actor, id).await
    }

    pub async fn update_draft(
        &self,
        actor: &Actor,
        id: &str,
        patch: ManuscriptPatch,
    ) -> Result<Draft> {
        let mut tx = db::begin_write(&self.pool).await?;
        let mut draft = owned_draft(&mut tx, actor, id).await?;

        if let Some(authors) = patch.authors {
            validate_authors(&authors, false)?;
            draft.authors = authors;
        }
        if let Some(track) = patch.track {
            open_conference(&mut tx, &draft.conference_id, &track).await?;
            draft.track = track;
        }
        if let Some(title) = patch.title {
            draft.title = title.trim().to_string();
        }
        if let Some(abstract_text) = patch.abstract_text {
            draft.abstract_text = abstract_text;
        }
        if let Some(paper_type) = patch.paper_type {
            draft.paper_type = paper_type;
        }
        if let Some(keywords) = patch.keywords {
            draft.keywords = keywords;
        }
        if let Some(agreements) = patch.agreements {
            draft.agreements = agreements;
        }
        draft.updated_at = Utc::now();

        db::update_draft(&mut tx, &draft).await?;
        tx.commit().await?;

        debug!("Draft {} updated", id);
        Ok(draft)
    }

    /// Stores a new version of a draft file. Versions count up per kind.
    pub async fn attach_draft_file(
        &self,
        actor: &Actor,
        id: &str,
        kind: FileKind,
        filename: &str,
        bytes: &[u8],
    ) -> Result<FileAsset> {
        if kind == FileKind::CameraReady {
            return Err(WorkflowError::state(
                "Camera-ready files can only be attached to accepted submissions",
            ));
        }
        let mime = gate_upload(kind, filename, bytes)?;

        let mut tx = db::begin_write(&self.pool).await?;
        let draft = owned_draft(&mut tx, actor, id).await?;
        let version = next_version(&draft.files, kind);
        let stored = self.files.persist(
            bytes,
            &FileMetadata {
                owner_id: draft.id.clone(),
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
        db::insert_file(&mut tx, Owner::Draft, &draft.id, &asset).await?;
        tx.commit().await?;

        info!("Draft {} file {:?} v{} stored", id, kind, version);
        Ok(asset)
    }

    pub async fn delete_draft(&self, actor: &Actor, id: &str) -> Result<()> {
        let mut tx = db::begin_write(&self.pool).await?;
        let draft = owned_draft(&mut tx, actor, id).await?;
        db::delete_draft(&mut tx, &draft.id).await?;
        tx.commit().await?;
        info!("Draft {} deleted by {}", id, actor.id);
        Ok(())
    }
}

/// Rejects empty uploads and files whose type the kind does not allow.
/// Returns the detected MIME type.
pub(crate) fn gate_upload(kind: FileKind, filename: &str, bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(WorkflowError::validation("Uploaded file is empty"));
    }
    let mime = detect_mime(filename);
    if !kind.accepts(&mime) {
        return Err(WorkflowError::validation(format!(
            "{} files must be one of {}, got {}",
            kind_label(kind),
            kind.allowed_mime_types().join(", "),
            mime
        )));
    }
    Ok(mime)
}

fn kind_label(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Manuscript => "Manuscript",
        FileKind::Supplementary => "Supplementary",
        FileKind::ResponseLetter => "Response letter",
        FileKind::CameraReady => "Camera-ready",
    }
}
