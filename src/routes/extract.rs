use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::Actor;
use crate::error::{ErrorKind, WorkflowError};
use crate::state::AppState;

/// Header carrying the authenticated member id, set by the fronting proxy.
pub const USER_HEADER: &str = "x-user-id";

/// The caller, resolved from [`USER_HEADER`].
pub struct CurrentActor(pub Actor);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        match state.workflow.resolve_actor(user_id).await? {
            Some(actor) => Ok(CurrentActor(actor)),
            None => Err(ApiError::Unauthenticated),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    BadRequest(String),
    Workflow(WorkflowError),
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::StateError => StatusCode::CONFLICT,
        ErrorKind::PermissionError => StatusCode::FORBIDDEN,
        ErrorKind::PolicyError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "kind": "UNAUTHENTICATED",
                    "message": format!("Missing or unknown {} header", USER_HEADER),
                })),
            )
                .into_response(),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "kind": ErrorKind::ValidationError, "message": message })),
            )
                .into_response(),
            ApiError::Workflow(err) => err.into_response(),
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = if kind == ErrorKind::Internal {
            tracing::error!("Request failed: {}", self);
            "Internal error".to_string()
        } else {
            self.to_string()
        };
        (status_for(kind), Json(json!({ "kind": kind, "message": message }))).into_response()
    }
}
