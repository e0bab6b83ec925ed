pub mod config;
pub mod models;
pub mod util;

use axum::{
    Json,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Structured result returned by every entry point.
#[derive(Debug, Clone)]
#[must_use]
pub struct ActionResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ActionResult {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, headers: HeaderMap::new(), body }
    }

    pub fn ok(body: Value) -> Self { Self::new(StatusCode::OK, body) }

    /// Irrelevant input that was deliberately skipped.
    pub fn ignored(message: &str) -> Self { Self::new(StatusCode::ACCEPTED, json!(message)) }

    pub fn bad_request(message: &str) -> Self { Self::new(StatusCode::BAD_REQUEST, json!(message)) }

    /// Server error; `reason` is the outermost context of `err`, `error` the full chain.
    pub fn internal_error(err: &anyhow::Error) -> Self {
        tracing::error!("{:?}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": format!("{err:#}"), "reason": err.to_string() }),
        )
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool { self.status.is_success() }
}

impl IntoResponse for ActionResult {
    fn into_response(self) -> Response { (self.status, self.headers, Json(self.body)).into_response() }
}
