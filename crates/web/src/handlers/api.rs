use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use cla_bot_actions::{
    ActionContext,
    check::handle_set_check,
    lookup::{LookupParams, handle_lookup},
};
use cla_bot_core::{ActionResult, models::CheckRequest};

fn rejected(rejection: JsonRejection) -> ActionResult {
    tracing::warn!("Rejected request body: {}", rejection.body_text());
    ActionResult::bad_request(&rejection.body_text())
}

pub async fn lookup(
    State(actions): State<ActionContext>,
    params: Result<Json<LookupParams>, JsonRejection>,
) -> ActionResult {
    match params {
        Ok(Json(params)) => handle_lookup(&actions, params).await,
        Err(rejection) => rejected(rejection),
    }
}

pub async fn check(
    State(actions): State<ActionContext>,
    request: Result<Json<CheckRequest>, JsonRejection>,
) -> ActionResult {
    match request {
        Ok(Json(request)) => handle_set_check(&actions, &request).await,
        Err(rejection) => rejected(rejection),
    }
}
