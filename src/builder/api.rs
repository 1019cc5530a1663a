use std::sync::{Arc, LazyLock};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use regex::Regex;
use tracing::{error, info, warn};

use crate::errors::SyncError;

use super::models::BuildRequest;
use super::orchestrator::RequestOrchestrator;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub orchestrator: RequestOrchestrator,
    /// `None` rejects every request.
    pub student_secret: Option<String>,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(serde_json::json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::RepoNotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", post(handle_request))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

static TASK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("static regex"));

/// Whether `task` can be used verbatim as a repository name.
pub fn is_valid_task_name(task: &str) -> bool {
    TASK_NAME.is_match(task) && task != "." && task != ".."
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "alive"}))
}

async fn handle_request(
    State(state): State<SharedState>,
    Json(req): Json<BuildRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match state.student_secret.as_deref() {
        Some(secret) if secret == req.secret => {}
        _ => {
            warn!(task = %req.task, email = %req.email, "rejected request with invalid secret");
            return Err(ApiError::Forbidden("Invalid secret".into()));
        }
    }

    if !is_valid_task_name(&req.task) {
        return Err(ApiError::BadRequest(format!(
            "Invalid task name '{}': must be a valid repository name",
            req.task
        )));
    }

    info!(task = %req.task, round = req.round, email = %req.email, "received task");

    let handled = state.orchestrator.handle(&req).await.map_err(|e| {
        error!(task = %req.task, round = req.round, error = %e, "request failed");
        ApiError::from(e)
    })?;

    // Notification continues in the background; its outcome is never reported here.
    drop(handled.notification);
    Ok((StatusCode::OK, Json(handled.response)))
}
