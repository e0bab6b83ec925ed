use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
};
use cla_bot_actions::{
    ActionContext, agreement::handle_sign_webhook, pull_request::handle_pull_request,
};
use cla_bot_core::ActionResult;
use cla_bot_github::webhook::{GitHubEvent, pull_request_event};

pub async fn github_webhook(
    State(actions): State<ActionContext>,
    GitHubEvent { event }: GitHubEvent,
) -> ActionResult {
    match event.repository.as_ref().and_then(|r| r.full_name.as_deref()) {
        Some(full_name) => {
            tracing::info!("Received webhook event {:?} from repository {}", event.kind, full_name)
        }
        None => tracing::info!("Received webhook event {:?}", event.kind),
    }
    let pull_request = pull_request_event(&event);
    handle_pull_request(&actions, pull_request.as_ref()).await
}

pub async fn sign_webhook(
    State(actions): State<ActionContext>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ActionResult {
    handle_sign_webhook(&actions, &method, &headers, &body).await
}
