use anyhow::{Context, Result};
use cla_bot_core::{
    ActionResult,
    models::{CheckRequest, PullRequestEvent},
};
use cla_bot_github::Membership;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    ActionContext,
    check::{CheckTarget, set_check},
    lookup::lookup_usernames,
};

/// Decide whether the author of a newly opened pull request is covered, and report it
/// as a check run.
///
/// - Organization members pass immediately.
/// - Everyone else needs a signed agreement whose form data names their login.
///
/// Events other than `opened`/`reopened` are ignored without any external calls.
pub async fn handle_pull_request(
    ctx: &ActionContext,
    event: Option<&PullRequestEvent>,
) -> ActionResult {
    let Some(event) = event.filter(|e| e.action.is_open()) else {
        return ActionResult::ignored("Not a pull request being opened, ignoring payload");
    };
    tracing::info!(
        "Checking pull request by @{} on {}/{}@{}",
        event.author_login,
        event.org_login,
        event.repo_name,
        event.head_commit_sha
    );
    match check_pull_request(ctx, event).await {
        Ok(title) => ActionResult::ok(json!(title)),
        Err(e) => ActionResult::internal_error(&e),
    }
}

async fn check_pull_request(ctx: &ActionContext, event: &PullRequestEvent) -> Result<String> {
    let target = CheckTarget {
        installation_id: event.installation_id,
        org: event.org_login.clone(),
        repo: event.repo_name.clone(),
        commit_sha: event.head_commit_sha.clone(),
        started_at: OffsetDateTime::now_utc(),
    };
    let installation = ctx
        .github
        .authenticate(event.installation_id)
        .await
        .context("Error authenticating as GitHub App installation.")?;
    let membership = installation
        .check_membership(&event.org_login, &event.author_login)
        .await
        .context("Error checking organization membership.")?;
    let request = match membership {
        Membership::Member => {
            tracing::info!("@{} is a member of {}", event.author_login, event.org_login);
            target.employee()
        }
        Membership::NotMember => verify_agreement(ctx, event, &target).await?,
    };
    set_check(ctx, &request).await.context("Error during GitHub Check creation.")
}

async fn verify_agreement(
    ctx: &ActionContext,
    event: &PullRequestEvent,
    target: &CheckTarget,
) -> Result<CheckRequest> {
    let user = event.author_login.as_str();
    let details_url = ctx.config.check.details_url.as_str();
    let access_token = ctx
        .sign
        .refresh_access_token()
        .await
        .context("Error retrieving Adobe Sign access token.")?;
    let agreements = ctx
        .sign
        .list_agreements(&access_token, user)
        .await
        .context("Error retrieving Adobe Sign agreements.")?;
    let agreement_ids = agreements
        .into_iter()
        .filter(|a| a.is_eligible(&ctx.config.sign.agreement_names))
        .map(|a| a.id)
        .collect::<Vec<_>>();
    if agreement_ids.is_empty() {
        tracing::info!("No signed agreements found for @{user}");
        return Ok(target.sign_required(details_url));
    }

    let usernames = lookup_usernames(ctx.sign.as_ref(), &agreement_ids, Some(&access_token))
        .await
        .context("Error looking up GitHub usernames.")?;
    if usernames.contains_ignore_case(user) {
        tracing::info!("Found signed agreement for @{user}");
        Ok(target.signed(user))
    } else {
        // The agreements matched the search, but none of them name this GitHub login
        tracing::info!(
            "{} signed agreements found for @{user}, but none list the username",
            agreement_ids.len()
        );
        Ok(target.sign_required(details_url))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use cla_bot_core::models::{CheckConclusion, PullRequestAction};

    use super::*;
    use crate::{
        check::{EMPLOYEE_TITLE, SIGN_TITLE, SIGNED_TITLE},
        fakes::{FakeGitHub, FakeSign, context},
    };

    fn event(action: PullRequestAction, author: &str) -> PullRequestEvent {
        PullRequestEvent {
            action,
            author_login: author.to_string(),
            org_login: "adobe".to_string(),
            repo_name: "brackets".to_string(),
            head_commit_sha: "abc123".to_string(),
            installation_id: 1,
        }
    }

    #[tokio::test]
    async fn test_ignored_events() {
        let github = FakeGitHub::default();
        let sign = FakeSign::default();
        let ctx = context(&github, &sign);

        let result = handle_pull_request(&ctx, None).await;
        assert_eq!(result.status, StatusCode::ACCEPTED);
        let closed = event(PullRequestAction::Other, "octocat");
        let result = handle_pull_request(&ctx, Some(&closed)).await;
        assert_eq!(result.status, StatusCode::ACCEPTED);

        assert!(github.calls().is_empty());
        assert!(sign.calls().is_empty());
    }

    #[tokio::test]
    async fn test_member() {
        let github = FakeGitHub::default();
        github.state().members.insert(("adobe".to_string(), "octocat".to_string()));
        let sign = FakeSign::default();
        let ctx = context(&github, &sign);

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Opened, "octocat"))).await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.body, json!(EMPLOYEE_TITLE));

        let runs = github.check_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].2.conclusion, CheckConclusion::Success);
        assert!(runs[0].2.output.summary.contains("github.com/adobe"));
        assert!(sign.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_agreements() {
        let github = FakeGitHub::default();
        let sign = FakeSign::default();
        sign.add_agreement("nda", "Mutual NDA", "SIGNED", "octocat");
        sign.add_agreement("pending", "Adobe CLA", "OUT_FOR_SIGNATURE", "octocat");
        let ctx = context(&github, &sign);

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Reopened, "octocat"))).await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.body, json!(SIGN_TITLE));

        let runs = github.check_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].2.conclusion, CheckConclusion::ActionRequired);
        assert_eq!(runs[0].2.details_url.as_deref(), Some("http://opensource.adobe.com/cla.html"));
        assert_eq!(sign.calls(), ["refresh_access_token", "list_agreements octocat"]);
    }

    #[tokio::test]
    async fn test_signed_agreement() {
        let github = FakeGitHub::default();
        let sign = FakeSign::default();
        sign.add_agreement("cla", "Adobe Contributor License Agreement", "SIGNED", "OctoCat");
        let ctx = context(&github, &sign);

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Opened, "octocat"))).await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.body, json!(SIGNED_TITLE));

        let runs = github.check_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].2.conclusion, CheckConclusion::Success);
        assert_eq!(
            runs[0].2.output.summary,
            "A Signed CLA has been found for the github user octocat"
        );
        // The token from the agreement search is reused for the form data
        assert_eq!(
            sign.calls().iter().filter(|c| c.as_str() == "refresh_access_token").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_agreement_for_other_user() {
        let github = FakeGitHub::default();
        let sign = FakeSign::default();
        sign.add_agreement("cla", "Adobe CLA", "SIGNED", "someone-else");
        let ctx = context(&github, &sign);

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Opened, "octocat"))).await;
        assert_eq!(result.body, json!(SIGN_TITLE));
        let runs = github.check_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].2.conclusion, CheckConclusion::ActionRequired);
    }

    #[tokio::test]
    async fn test_membership_error() {
        let github = FakeGitHub::default();
        github.state().membership_error = true;
        let sign = FakeSign::default();
        let ctx = context(&github, &sign);

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Opened, "octocat"))).await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.body["reason"], "Error checking organization membership.");
        assert!(github.check_runs().is_empty());
        assert!(sign.calls().is_empty());
    }

    #[tokio::test]
    async fn test_token_refresh_error() {
        let github = FakeGitHub::default();
        let sign = FakeSign::default();
        sign.state().failing_refresh = true;
        let ctx = context(&github, &sign);

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Opened, "octocat"))).await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.body["reason"], "Error retrieving Adobe Sign access token.");
        assert!(github.check_runs().is_empty());
    }

    #[tokio::test]
    async fn test_check_creation_error() {
        let github = FakeGitHub::default();
        github.state().members.insert(("adobe".to_string(), "octocat".to_string()));
        github.state().failing_checks = true;
        let ctx = context(&github, &FakeSign::default());

        let result =
            handle_pull_request(&ctx, Some(&event(PullRequestAction::Opened, "octocat"))).await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.body["reason"], "Error during GitHub Check creation.");
        let creates =
            github.calls().iter().filter(|c| c.starts_with("create_check_run")).count();
        assert_eq!(creates, 1);
    }
}
