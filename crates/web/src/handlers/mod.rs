use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

mod api;
mod webhook;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/api/github/webhook", post(webhook::github_webhook))
        .route("/api/sign/webhook", get(webhook::sign_webhook).post(webhook::sign_webhook))
        .route("/api/lookup", post(api::lookup))
        .route("/api/check", post(api::check))
}
