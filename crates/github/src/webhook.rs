use std::{fmt::Display, sync::Arc};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
};
use cla_bot_core::{
    ActionResult,
    config::Config,
    models::{PullRequestAction, PullRequestEvent},
};
use hmac::{Hmac, Mac};
use octocrab::models::webhook_events::{
    EventInstallation, WebhookEvent, WebhookEventPayload,
    payload::PullRequestWebhookEventAction,
};
use sha2::Sha256;

/// Verify and extract GitHub Event Payload.
#[derive(Clone)]
#[must_use]
pub struct GitHubEvent {
    pub event: WebhookEvent,
}

impl<S> FromRequest<S> for GitHubEvent
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync + Clone,
{
    type Rejection = ActionResult;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> ActionResult {
            tracing::error!("{m}");
            ActionResult::bad_request(&m.to_string())
        }
        let event = req
            .headers()
            .get("X-GitHub-Event")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-GitHub-Event header missing"))?
            .to_string();
        let config = <Arc<Config>>::from_ref(state);
        let signature_sha256 = req
            .headers()
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-Hub-Signature-256 missing"))?
            .strip_prefix("sha256=")
            .ok_or_else(|| err("X-Hub-Signature-256 sha256= prefix missing"))?;
        let signature =
            hex::decode(signature_sha256).map_err(|_| err("X-Hub-Signature-256 malformed"))?;
        let body = Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
        if !verify_signature(config.github.app.webhook_secret.as_bytes(), &body, &signature) {
            return Err(err("signature mismatch"));
        }
        let value = WebhookEvent::try_from_header_and_body(&event, &body)
            .map_err(|_| err("error parsing body"))?;
        Ok(GitHubEvent { event: value })
    }
}

pub fn verify_signature(secret: &[u8], body: &[u8], signature: &[u8]) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(signature).is_ok()
}

/// Extracts the pull request fields the checker needs.
///
/// Returns `None` for non-`pull_request` events and for payloads missing the author,
/// base repository owner or installation.
pub fn pull_request_event(event: &WebhookEvent) -> Option<PullRequestEvent> {
    let WebhookEventPayload::PullRequest(payload) = &event.specific else {
        return None;
    };
    let action = match payload.action {
        PullRequestWebhookEventAction::Opened => PullRequestAction::Opened,
        PullRequestWebhookEventAction::Reopened => PullRequestAction::Reopened,
        _ => PullRequestAction::Other,
    };
    let pull = &payload.pull_request;
    let base_repo = pull.base.repo.as_ref()?;
    let installation_id = match event.installation.as_ref()? {
        EventInstallation::Full(installation) => installation.id,
        EventInstallation::Minimal(installation) => installation.id,
    };
    Some(PullRequestEvent {
        action,
        author_login: pull.user.as_ref()?.login.clone(),
        org_login: base_repo.owner.as_ref()?.login.clone(),
        repo_name: base_repo.name.clone(),
        head_commit_sha: pull.head.sha.clone(),
        installation_id: installation_id.into_inner(),
    })
}
