//! JSON API over the workflow engine.

mod api;
mod extract;

pub use extract::{status_for, ApiError, CurrentActor, USER_HEADER};

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/signup", post(api::sign_up))
        .route("/api/me", get(api::current_member))
        .route("/api/members", post(api::register_member))
        .route("/api/members/:id", get(api::get_member).delete(api::delete_member))
        .route("/api/members/:id/roles", put(api::set_roles))
        .route(
            "/api/conferences",
            post(api::register_conference).get(api::conference_for_year),
        )
        .route("/api/conferences/:id/active", put(api::set_conference_active))
        .route("/api/drafts", post(api::create_draft))
        .route(
            "/api/drafts/:id",
            get(api::get_draft)
                .patch(api::update_draft)
                .delete(api::delete_draft),
        )
        .route("/api/drafts/:id/files", post(api::upload_draft_file))
        .route("/api/drafts/:id/promote", post(api::promote_draft))
        .route(
            "/api/submissions",
            post(api::create_submission).get(api::list_submissions),
        )
        .route(
            "/api/submissions/:id",
            get(api::get_submission)
                .patch(api::edit_submission)
                .delete(api::delete_submission),
        )
        .route("/api/submissions/:id/submit", post(api::submit))
        .route("/api/submissions/:id/resubmit", post(api::resubmit))
        .route("/api/submissions/:id/withdraw", post(api::withdraw))
        .route("/api/submissions/:id/files", post(api::upload_submission_file))
        .route("/api/submissions/:id/reviewers", post(api::assign_reviewers))
        .route("/api/submissions/:id/decisions", post(api::record_decision))
        .route("/api/manuscripts/:id", get(api::get_manuscript))
        .route("/api/assignments", get(api::list_assignments))
        .route("/api/assignments/:id/respond", post(api::respond_to_assignment))
        .route("/api/assignments/:id/review", post(api::submit_review))
        .route("/api/reviewers/workload", get(api::reviewer_workload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
