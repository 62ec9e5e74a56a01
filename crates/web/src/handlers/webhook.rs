use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use octocrab::models::webhook_events::{
    WebhookEventPayload, payload::PullRequestWebhookEventAction,
};
use pullcheck_core::AppError;
use pullcheck_github::webhook::GitHubEvent;

use crate::{AppState, handlers::api::enqueue_analysis};

/// Webhook handler that enqueues analysis jobs instead of handling
/// events synchronously. Anything but a pull request being opened,
/// reopened, or synchronized is acknowledged as a no-op.
pub async fn webhook(
    State(state): State<AppState>,
    GitHubEvent { event }: GitHubEvent,
) -> Result<Response, AppError> {
    let WebhookEventPayload::PullRequest(inner) = &event.specific else {
        tracing::debug!("Ignoring webhook event {:?}", event.kind);
        return Ok((StatusCode::OK, "Event ignored").into_response());
    };
    if !matches!(
        inner.action,
        PullRequestWebhookEventAction::Opened
            | PullRequestWebhookEventAction::Reopened
            | PullRequestWebhookEventAction::Synchronize
    ) {
        tracing::debug!("Ignoring pull request action {:?}", inner.action);
        return Ok((StatusCode::OK, "Action ignored").into_response());
    }

    let Some(repo_url) = event
        .repository
        .as_ref()
        .and_then(|repository| repository.html_url.as_ref())
        .map(ToString::to_string)
    else {
        tracing::warn!("Received pull request event with no repository URL");
        return Ok((StatusCode::OK, "No repository URL").into_response());
    };

    let token = state.config.github.token.clone();
    if token.is_empty() {
        tracing::warn!("No default GitHub token configured, ignoring pull request event");
        return Ok((StatusCode::OK, "No token configured").into_response());
    }

    let pr_number = inner.number;
    tracing::info!(
        "Received pull request event {:?} for {} #{}",
        inner.action,
        repo_url,
        pr_number
    );
    enqueue_analysis(&state, repo_url, pr_number, token).await?;
    Ok((StatusCode::OK, "Event processed").into_response())
}
