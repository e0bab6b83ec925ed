use std::{collections::HashMap, slice, sync::Arc};

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use cla_bot_core::{
    ActionResult,
    models::{ReconciliationResult, UpdatedPull, UsernameSet},
};
use cla_bot_github::{Installation, PullRef};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    ActionContext,
    check::{CheckTarget, set_check},
    lookup::lookup_usernames,
};

/// Sent by Adobe Sign on webhook registration and notifications. It must be echoed back
/// for Adobe Sign to keep delivering events.
pub static CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("x-adobesign-clientid");

pub const AGREEMENT_SIGNED: &str = "ESIGNED";

/// Adobe Sign agreement webhook notification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignWebhookEvent {
    pub action_type: Option<String>,
    pub agreement: Option<WebhookAgreement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookAgreement {
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// How far a reconciliation got before failing.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stage {
    Filter,
    Resolve,
    Sweep,
    Aggregate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Resolve => "resolve",
            Self::Sweep => "sweep",
            Self::Aggregate => "aggregate",
        }
    }
}

/// Returns the client ID header to echo back, if it matches ours.
fn verified_client_id(client_id: &str, headers: &HeaderMap) -> Option<HeaderValue> {
    headers.get(&CLIENT_ID_HEADER).filter(|v| v.as_bytes() == client_id.as_bytes()).cloned()
}

/// Entry point for Adobe Sign webhook requests.
///
/// A `GET` carrying the client ID header is the registration handshake and only echoes
/// the client ID. Other requests carry an event that is reconciled against open pull
/// requests.
pub async fn handle_sign_webhook(
    ctx: &ActionContext,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> ActionResult {
    let client_id = verified_client_id(&ctx.config.sign.client_id, headers);
    if headers.contains_key(&CLIENT_ID_HEADER) && client_id.is_none() {
        tracing::warn!("Received Adobe Sign webhook with unknown client ID");
    }
    let result = if method == Method::GET && headers.contains_key(&CLIENT_ID_HEADER) {
        tracing::info!("Adobe Sign webhook verification (client ID verified: {})", client_id.is_some());
        ActionResult::new(
            StatusCode::NO_CONTENT,
            json!({ "ClientIdHeaderStatus": client_id.is_some() }),
        )
    } else {
        match serde_json::from_slice::<SignWebhookEvent>(body) {
            Ok(event) => reconcile(ctx, &event).await,
            Err(e) => {
                tracing::warn!("Received malformed Adobe Sign webhook: {e}");
                ActionResult::bad_request("Malformed webhook payload")
            }
        }
    };
    match client_id {
        Some(value) => result.with_header(CLIENT_ID_HEADER.clone(), value),
        None => result,
    }
}

/// Re-checks every open pull request by the signer of a completed agreement.
pub async fn reconcile(ctx: &ActionContext, event: &SignWebhookEvent) -> ActionResult {
    let mut stage = Stage::Filter;
    match run_reconcile(ctx, event, &mut stage).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Reconciliation failed during {}: {:?}", stage.as_str(), e);
            ActionResult::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("{e:#}"),
                    "reason": e.to_string(),
                    "stage": stage.as_str(),
                }),
            )
        }
    }
}

async fn run_reconcile(
    ctx: &ActionContext,
    event: &SignWebhookEvent,
    stage: &mut Stage,
) -> Result<ActionResult> {
    let agreement_id = match completed_agreement(event, &ctx.config.sign.agreement_names) {
        Ok(id) => id,
        Err(reason) => {
            tracing::info!("Ignoring Adobe Sign event: {reason}");
            return Ok(ActionResult::bad_request(reason));
        }
    };

    *stage = Stage::Resolve;
    let usernames =
        lookup_usernames(ctx.sign.as_ref(), slice::from_ref(agreement_id), None)
            .await
            .with_context(|| format!("Error looking up GitHub usernames for {agreement_id}."))?;
    let usernames = github_logins(&usernames);
    if usernames.is_empty() {
        tracing::warn!("Agreement {agreement_id} does not list any GitHub usernames");
        return Ok(ActionResult::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "reason": format!("No GitHub usernames found in agreement {agreement_id}."),
                "stage": stage.as_str(),
            }),
        ));
    }
    tracing::info!(
        "Agreement {agreement_id} signed by {}",
        usernames.iter().collect::<Vec<_>>().join(", ")
    );

    *stage = Stage::Sweep;
    let result = sweep(ctx, &usernames).await;

    *stage = Stage::Aggregate;
    tracing::info!(
        "Reconciled agreement {agreement_id}: {} updated, {} errors",
        result.completed.len(),
        result.errors.len()
    );
    if result.errors.is_empty() {
        Ok(ActionResult::ok(json!({ "completed": result.completed })))
    } else {
        Ok(ActionResult::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "errors": result.errors, "completed": result.completed }),
        ))
    }
}

/// Returns the agreement ID of a completed contribution agreement, or why the event
/// is not one.
fn completed_agreement<'a>(
    event: &'a SignWebhookEvent,
    names: &[String],
) -> Result<&'a String, &'static str> {
    if event.action_type.as_deref() != Some(AGREEMENT_SIGNED) {
        return Err("Not an agreement signed event");
    }
    let Some(agreement) = &event.agreement else {
        return Err("Event has no agreement");
    };
    let (Some(id), Some(name)) = (&agreement.id, &agreement.name) else {
        return Err("Agreement is missing an ID or name");
    };
    if id.is_empty() || !names.contains(name) {
        return Err("Not a contribution agreement");
    }
    Ok(id)
}

/// Whether `username` can be a GitHub login: ASCII letters, digits, `-` and `_`, not
/// starting with `-`, at most 39 characters. Anything else could smuggle search
/// qualifiers into a query.
pub fn is_github_login(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 39
        && !username.starts_with('-')
        && username.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Drops the usernames that are not valid GitHub logins.
pub fn github_logins(usernames: &UsernameSet) -> UsernameSet {
    usernames
        .iter()
        .filter(|username| {
            let valid = is_github_login(username);
            if !valid {
                tracing::warn!("Ignoring invalid GitHub username {:?}", username);
            }
            valid
        })
        .map(str::to_string)
        .collect()
}

/// Open pull requests in `org` authored by any of `usernames`. Usernames that are not
/// valid GitHub logins are left out.
pub fn search_query(org: &str, usernames: &UsernameSet) -> String {
    let mut query = format!("is:pr is:open org:{org}");
    for username in usernames.iter().filter(|u| is_github_login(u)) {
        query.push_str(" author:");
        query.push_str(username);
    }
    query
}

/// Searches every monitored organization for open pull requests by `usernames` and marks
/// each one as signed.
///
/// Organizations, and pull requests within an organization, are processed concurrently.
/// A failure is recorded against its organization or pull request and never stops the
/// others.
pub async fn sweep(ctx: &ActionContext, usernames: &UsernameSet) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();
    let logins = github_logins(usernames);
    if logins.is_empty() {
        // A query without author qualifiers would match every open pull request
        result.errors.push("No valid GitHub usernames to search for".to_string());
        return result;
    }

    let concurrency = ctx.config.sweep.concurrency.max(1);
    let org_sem = Arc::new(Semaphore::new(concurrency));
    let pull_sem = Arc::new(Semaphore::new(concurrency));
    let mut set = JoinSet::new();
    let mut task_orgs = HashMap::new();
    for (org, &installation_id) in &ctx.config.orgs {
        let ctx = ctx.clone();
        let query = search_query(org, &logins);
        let org_sem = org_sem.clone();
        let pull_sem = pull_sem.clone();
        let task_org = org.clone();
        let handle = set.spawn(async move {
            let _permit = org_sem.acquire().await;
            sweep_org(&ctx, &task_org, installation_id, &query, pull_sem).await
        });
        task_orgs.insert(handle.id(), org.clone());
    }

    while let Some(join_result) = set.join_next_with_id().await {
        match join_result {
            Ok((_, org_result)) => result.merge(org_result),
            Err(e) => {
                let org = task_orgs.get(&e.id()).map(String::as_str).unwrap_or("[unknown]");
                tracing::error!("Failed to join sweep task for {}: {:?}", org, e);
                result.errors.push(format!("{org}: {e}"));
            }
        }
    }
    result
}

async fn sweep_org(
    ctx: &ActionContext,
    org: &str,
    installation_id: u64,
    query: &str,
    pull_sem: Arc<Semaphore>,
) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();
    let (installation, pulls) = match search_org(ctx, installation_id, query).await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("Failed to search {}: {:?}", org, e);
            result.errors.push(format!("{org}: {e:#}"));
            return result;
        }
    };
    tracing::info!("Found {} open pull requests in {}", pulls.len(), org);

    struct TaskResult {
        pull: PullRef,
        result: Result<UpdatedPull>,
    }
    let mut set = JoinSet::new();
    let mut task_pulls = HashMap::new();
    for pull in pulls {
        if !pull.owner.eq_ignore_ascii_case(org) {
            tracing::error!(
                "Search in {} returned {}/{}#{}, skipping",
                org,
                pull.owner,
                pull.repo,
                pull.number
            );
            result.errors.push(format!(
                "{}/{}#{}: not in organization {org}",
                pull.owner, pull.repo, pull.number
            ));
            continue;
        }
        let ctx = ctx.clone();
        let installation = installation.clone();
        let pull_sem = pull_sem.clone();
        let label = format!("{}/{}#{}", pull.owner, pull.repo, pull.number);
        let handle = set.spawn(async move {
            let _permit = pull_sem.acquire().await;
            let result = update_pull(&ctx, installation.as_ref(), installation_id, &pull).await;
            TaskResult { pull, result }
        });
        task_pulls.insert(handle.id(), label);
    }
    while let Some(join_result) = set.join_next_with_id().await {
        match join_result {
            Ok((_, TaskResult { pull: _, result: Ok(updated) })) => {
                tracing::info!("Updated {}/{}#{}", updated.org, updated.repo, updated.pr_number);
                result.completed.push(updated);
            }
            Ok((_, TaskResult { pull, result: Err(e) })) => {
                tracing::error!(
                    "Failed to update {}/{}#{}: {:?}",
                    pull.owner,
                    pull.repo,
                    pull.number,
                    e
                );
                result.errors.push(format!("{}/{}#{}: {e:#}", pull.owner, pull.repo, pull.number));
            }
            Err(e) => {
                let target = task_pulls.get(&e.id()).map(String::as_str).unwrap_or(org);
                tracing::error!("Failed to join update task for {}: {:?}", target, e);
                result.errors.push(format!("{target}: {e}"));
            }
        }
    }
    result
}

async fn search_org(
    ctx: &ActionContext,
    installation_id: u64,
    query: &str,
) -> Result<(Arc<dyn Installation>, Vec<PullRef>)> {
    let installation = ctx.github.authenticate(installation_id).await?;
    let pulls = installation.search_open_pulls(query).await?;
    Ok((installation, pulls))
}

async fn update_pull(
    ctx: &ActionContext,
    installation: &dyn Installation,
    installation_id: u64,
    pull: &PullRef,
) -> Result<UpdatedPull> {
    let head = installation.get_pull_request(&pull.owner, &pull.repo, pull.number).await?;
    let target = CheckTarget {
        installation_id,
        org: pull.owner.clone(),
        repo: pull.repo.clone(),
        commit_sha: head.head_sha,
        started_at: OffsetDateTime::now_utc(),
    };
    set_check(ctx, &target.signed(&head.author_login)).await?;
    Ok(UpdatedPull { org: pull.owner.clone(), repo: pull.repo.clone(), pr_number: pull.number })
}
