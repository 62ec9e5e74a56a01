use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

mod api;
mod webhook;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/", get(api::root))
        .route("/analyze-pr", post(api::analyze_pr))
        .route("/status/{task_id}", get(api::status))
        .route("/results/{task_id}", get(api::results))
        .route("/webhook", post(webhook::webhook))
}
