use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::extract::{ApiError, CurrentActor};
use crate::domain::{
    DecisionResult, FileKind, ManuscriptInput, ManuscriptPatch, ReviewInput, Role, SubmissionQuery,
};
use crate::state::AppState;
use crate::workflow::{NewConference, NewMember};

type ApiResult<T> = Result<T, ApiError>;

// Members

#[derive(Deserialize)]
pub struct SignUpForm {
    name: String,
    email: String,
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(form): Json<SignUpForm>,
) -> ApiResult<impl IntoResponse> {
    let member = state.workflow.sign_up(&form.name, &form.email).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn register_member(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<NewMember>,
) -> ApiResult<impl IntoResponse> {
    let member = state.workflow.register_member(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn current_member(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.member(&actor.id).await?))
}

pub async fn get_member(
    State(state): State<Arc<AppState>>,
    CurrentActor(_actor): CurrentActor,
    Path(member_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.member(&member_id).await?))
}

#[derive(Deserialize)]
pub struct RolesForm {
    roles: Vec<Role>,
}

pub async fn set_roles(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(member_id): Path<String>,
    Json(form): Json<RolesForm>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.set_roles(&actor, &member_id, &form.roles).await?))
}

pub async fn delete_member(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(member_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.workflow.delete_member(&actor, &member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Conferences

pub async fn register_conference(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<NewConference>,
) -> ApiResult<impl IntoResponse> {
    let conference = state.workflow.register_conference(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(conference)))
}

#[derive(Deserialize)]
pub struct YearQuery {
    year: i32,
}

pub async fn conference_for_year(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YearQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.conference_for_year(query.year).await?))
}

#[derive(Deserialize)]
pub struct ActiveForm {
    active: bool,
}

pub async fn set_conference_active(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(conference_id): Path<String>,
    Json(form): Json<ActiveForm>,
) -> ApiResult<impl IntoResponse> {
    state
        .workflow
        .set_conference_active(&actor, &conference_id, form.active)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Drafts

pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<ManuscriptInput>,
) -> ApiResult<impl IntoResponse> {
    let draft = state.workflow.create_draft(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(draft)))
}

pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(draft_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.get_draft(&actor, &draft_id).await?))
}

pub async fn update_draft(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(draft_id): Path<String>,
    Json(patch): Json<ManuscriptPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.update_draft(&actor, &draft_id, patch).await?))
}

pub async fn delete_draft(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(draft_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.workflow.delete_draft(&actor, &draft_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_draft_file(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(draft_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let upload = read_upload(multipart).await?;
    let asset = state
        .workflow
        .attach_draft_file(&actor, &draft_id, upload.kind, &upload.filename, &upload.bytes)
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn promote_draft(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(draft_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let submission = state.workflow.promote_draft(&actor, &draft_id).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

// Submissions

#[derive(Deserialize)]
pub struct NewSubmissionForm {
    #[serde(flatten)]
    manuscript: ManuscriptInput,
    #[serde(default)]
    submit_now: bool,
}

pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(form): Json<NewSubmissionForm>,
) -> ApiResult<impl IntoResponse> {
    let submission = state
        .workflow
        .create_submission(&actor, form.manuscript, form.submit_now)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<SubmissionQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.list_submissions_for_actor(&actor, &query).await?))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.get_submission(&actor, &submission_id).await?))
}

pub async fn get_manuscript(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.get_manuscript(&actor, &id).await?))
}

pub async fn edit_submission(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
    Json(patch): Json<ManuscriptPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .workflow
            .edit_submission(&actor, &submission_id, patch)
            .await?,
    ))
}

pub async fn delete_submission(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.workflow.delete_submission(&actor, &submission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.submit(&actor, &submission_id).await?))
}

pub async fn resubmit(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.resubmit(&actor, &submission_id).await?))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.withdraw(&actor, &submission_id).await?))
}

pub async fn upload_submission_file(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let upload = read_upload(multipart).await?;
    let asset = state
        .workflow
        .attach_submission_file(
            &actor,
            &submission_id,
            upload.kind,
            &upload.filename,
            &upload.bytes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

// Review

#[derive(Deserialize)]
pub struct AssignForm {
    reviewer_ids: Vec<String>,
    due_at: Option<DateTime<Utc>>,
}

pub async fn assign_reviewers(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
    Json(form): Json<AssignForm>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .workflow
            .assign_reviewers(&actor, &submission_id, &form.reviewer_ids, form.due_at)
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct QueueQuery {
    reviewer_id: Option<String>,
}

pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<QueueQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .workflow
            .list_assignments_for_reviewer(&actor, query.reviewer_id.as_deref())
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct RespondForm {
    accept: bool,
}

pub async fn respond_to_assignment(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(assignment_id): Path<String>,
    Json(form): Json<RespondForm>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .workflow
            .respond_to_assignment(&actor, &assignment_id, form.accept)
            .await?,
    ))
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(assignment_id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> ApiResult<impl IntoResponse> {
    let assignment = state
        .workflow
        .submit_review(&actor, &assignment_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn reviewer_workload(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workflow.reviewer_workload(&actor).await?))
}

#[derive(Deserialize)]
pub struct DecisionForm {
    result: String,
    #[serde(default)]
    note: String,
}

pub async fn record_decision(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(submission_id): Path<String>,
    Json(form): Json<DecisionForm>,
) -> ApiResult<impl IntoResponse> {
    let result: DecisionResult = form.result.parse()?;
    let submission = state
        .workflow
        .record_decision(&actor, &submission_id, result, &form.note)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

struct Upload {
    kind: FileKind,
    filename: String,
    bytes: Vec<u8>,
}

/// Reads a `kind` text field and a `file` field from a multipart body.
async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut kind = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        if name == "kind" {
            let text = field.text().await?;
            let parsed: FileKind = serde_json::from_value(serde_json::Value::String(
                text.trim().to_uppercase(),
            ))
            .map_err(|_| ApiError::BadRequest(format!("Unknown file kind: {}", text)))?;
            kind = Some(parsed);
        } else if name == "file" {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            let data = field.bytes().await?;
            file = Some((filename, data.to_vec()));
        }
    }

    let kind = kind.ok_or_else(|| ApiError::BadRequest("Missing 'kind' field".to_string()))?;
    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;
    Ok(Upload {
        kind,
        filename,
        bytes,
    })
}
