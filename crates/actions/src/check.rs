use anyhow::{Context, Result};
use cla_bot_core::{
    ActionResult,
    models::{CheckConclusion, CheckRequest, CheckStatus},
};
use cla_bot_github::{CheckRun, CheckRunOutput};
use serde_json::json;
use time::OffsetDateTime;

use crate::ActionContext;

pub const EMPLOYEE_TITLE: &str = "✓ Adobe Employee";
pub const SIGNED_TITLE: &str = "CLA Signed";
pub const SIGN_TITLE: &str = "Sign the Adobe CLA!";

const SIGN_SUMMARY: &str = "No signed agreements were found. Please [sign the Adobe CLA]({url})! \
    Once signed, close and re-open your pull request to run the check again.\n\n \
    If you are an Adobe employee, you do not have to sign the CLA. Instead contact Adobe's Open \
    Source Office about the failure by mentioning them on the pull request with \
    **@adobe/open-source-office** or via email <grp-opensourceoffice@adobe.com>.";

/// The commit a decision is reported against.
#[derive(Debug, Clone)]
pub struct CheckTarget {
    pub installation_id: u64,
    pub org: String,
    pub repo: String,
    pub commit_sha: String,
    pub started_at: OffsetDateTime,
}

impl CheckTarget {
    fn request(
        &self,
        conclusion: CheckConclusion,
        title: &str,
        summary: String,
        details_url: Option<String>,
    ) -> CheckRequest {
        CheckRequest {
            installation_id: self.installation_id,
            org: self.org.clone(),
            repo: self.repo.clone(),
            commit_sha: self.commit_sha.clone(),
            status: CheckStatus::Completed,
            conclusion,
            title: title.to_string(),
            summary,
            started_at: self.started_at,
            details_url,
        }
    }

    pub fn employee(&self) -> CheckRequest {
        self.request(
            CheckConclusion::Success,
            EMPLOYEE_TITLE,
            format!(
                "Pull request issued by an Adobe Employee (based on membership in github.com/{}), carry on.",
                self.org
            ),
            None,
        )
    }

    pub fn signed(&self, username: &str) -> CheckRequest {
        self.request(
            CheckConclusion::Success,
            SIGNED_TITLE,
            format!("A Signed CLA has been found for the github user {username}"),
            None,
        )
    }

    pub fn sign_required(&self, details_url: &str) -> CheckRequest {
        self.request(
            CheckConclusion::ActionRequired,
            SIGN_TITLE,
            SIGN_SUMMARY.replace("{url}", details_url),
            Some(details_url.to_string()),
        )
    }
}

/// Creates a check run for `request`, returning its title.
///
/// This is the only place check state is written. Nothing is retried.
pub async fn set_check(ctx: &ActionContext, request: &CheckRequest) -> Result<String> {
    let installation = ctx.github.authenticate(request.installation_id).await?;
    let run = CheckRun {
        name: ctx.config.check.name.clone(),
        head_sha: request.commit_sha.clone(),
        status: request.status,
        conclusion: request.conclusion,
        started_at: request.started_at,
        completed_at: OffsetDateTime::now_utc(),
        details_url: request.details_url.clone(),
        output: CheckRunOutput { title: request.title.clone(), summary: request.summary.clone() },
    };
    installation.create_check_run(&request.org, &request.repo, &run).await?;
    tracing::info!(
        "Set check \"{}\" ({}) on {}/{}@{}",
        request.title,
        request.conclusion,
        request.org,
        request.repo,
        request.commit_sha
    );
    Ok(request.title.clone())
}

pub async fn handle_set_check(ctx: &ActionContext, request: &CheckRequest) -> ActionResult {
    match set_check(ctx, request).await.context("Error during GitHub Check creation.") {
        Ok(title) => ActionResult::ok(json!({ "title": title })),
        Err(e) => ActionResult::internal_error(&e),
    }
}
