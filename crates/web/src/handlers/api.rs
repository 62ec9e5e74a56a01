use anyhow::Context;
use apalis::prelude::Storage;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pullcheck_core::{AppError, models::JobStatus};
use pullcheck_jobs::AnalyzePrJob;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::AppState;

pub async fn root() -> Response {
    Json(json!({ "message": "Welcome to the AI Code Review system" })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AnalyzePrRequest {
    pub repo_url: String,
    pub pr_number: u64,
    #[serde(default)]
    pub github_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    task_id: String,
    status: &'static str,
}

/// Accept an analysis request: create a PENDING job record, hand the
/// work to the queue, and return the job id immediately.
pub async fn analyze_pr(
    State(state): State<AppState>,
    Json(request): Json<AnalyzePrRequest>,
) -> Result<Response, AppError> {
    // Fall back to the configured default token (original behavior:
    // GITHUB_TOKEN from the environment).
    let token = request
        .github_token
        .filter(|token| !token.is_empty())
        .unwrap_or_else(|| state.config.github.token.clone());
    if token.is_empty() {
        return Err(AppError::validation("GitHub token is missing in the request"));
    }
    if request.repo_url.is_empty() || request.pr_number == 0 {
        return Err(AppError::validation("Information missing in the request"));
    }

    let task_id = enqueue_analysis(&state, request.repo_url, request.pr_number, token).await?;
    Ok(Json(StatusResponse { task_id, status: JobStatus::Pending.as_str() }).into_response())
}

/// Shared enqueue path for direct requests and webhooks. Identical
/// `(repo_url, pr_number)` requests are deliberately not deduplicated;
/// each enqueue runs as an independent job.
pub(crate) async fn enqueue_analysis(
    state: &AppState,
    repo_url: String,
    pr_number: u64,
    token: String,
) -> Result<String, AppError> {
    let job_id = Uuid::new_v4().to_string();
    state.db.create_job(&job_id, &repo_url, pr_number).await?;
    let mut storage = state.jobs.analyze_pr();
    storage
        .push(AnalyzePrJob { job_id: job_id.clone(), repo_url, pr_number, token })
        .await
        .context("Failed to enqueue analysis job")?;
    tracing::info!("Enqueued analysis job {job_id} for PR #{pr_number}");
    Ok(job_id)
}

pub async fn status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, AppError> {
    match state.db.get_job(&task_id).await? {
        Some(job) => {
            Ok(Json(StatusResponse { task_id, status: job.status.as_str() }).into_response())
        }
        None => Ok(not_found(task_id)),
    }
}

pub async fn results(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, AppError> {
    let Some(job) = state.db.get_job(&task_id).await? else {
        return Ok(not_found(task_id));
    };
    let body = match job.status {
        JobStatus::Success => json!({ "task_id": task_id, "result": job.result }),
        JobStatus::Failure => json!({ "task_id": task_id, "error": job.error }),
        status => json!({ "task_id": task_id, "status": status }),
    };
    Ok(Json(body).into_response())
}

/// An unknown or expired id is a well-formed outcome, not a fault.
fn not_found(task_id: String) -> Response {
    (StatusCode::NOT_FOUND, Json(StatusResponse { task_id, status: "NOT_FOUND" }))
        .into_response()
}
