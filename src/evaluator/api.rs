use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::error;

use super::models::NotifyRequest;
use super::pipeline::{EvaluationError, EvaluationTarget, Evaluator};

pub struct EvaluatorState {
    pub evaluator: Evaluator,
}

pub type SharedEvaluator = Arc<EvaluatorState>;

pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(serde_json::json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub fn api_router() -> Router<SharedEvaluator> {
    Router::new()
        .route("/notify", post(notify))
        .route("/results", get(list_results))
        .route("/health", get(health_check))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "alive"}))
}

async fn notify(
    State(state): State<SharedEvaluator>,
    Json(req): Json<NotifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(repo_url) = req.repo_url.filter(|u| !u.trim().is_empty()) else {
        return Err(ApiError::BadRequest("repo_url is required".into()));
    };

    let target = EvaluationTarget {
        repo_url,
        pages_url: req.pages_url,
        brief: req.brief,
        email: req.email,
    };
    let results = state.evaluator.evaluate(&target).await.map_err(|e| {
        error!(repo_url = %target.repo_url, error = %e, "evaluation failed");
        ApiError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "evaluation_complete",
        "results": results,
    })))
}

async fn list_results(State(state): State<SharedEvaluator>) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .evaluator
        .store()
        .list()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(serde_json::json!({ "results": results })))
}
