pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cla_bot_core::{
    config::GitHubConfig,
    models::{CheckConclusion, CheckStatus},
};
use octocrab::{Octocrab, models::InstallationId};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Membership {
    Member,
    NotMember,
}

/// An open pull request found by search.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PullRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PullHead {
    pub head_sha: String,
    pub author_login: String,
}

/// Body of `POST /repos/{owner}/{repo}/check-runs`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CheckRun {
    pub name: String,
    pub head_sha: String,
    pub status: CheckStatus,
    pub conclusion: CheckConclusion,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
    pub output: CheckRunOutput,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
}

/// Authenticates as an installation of the GitHub App.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, installation_id: u64) -> Result<Arc<dyn Installation>>;
}

/// Calls made on behalf of a single installation.
#[async_trait]
pub trait Installation: Send + Sync {
    async fn check_membership(&self, org: &str, username: &str) -> Result<Membership>;

    async fn create_check_run(&self, owner: &str, repo: &str, run: &CheckRun) -> Result<()>;

    async fn search_open_pulls(&self, query: &str) -> Result<Vec<PullRef>>;

    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullHead>;
}

#[derive(Clone)]
pub struct GitHub {
    pub app_client: Octocrab,
}

impl GitHub {
    pub fn new(config: &GitHubConfig) -> Result<Arc<Self>> {
        let app_client = Octocrab::builder()
            .app(
                config.app.id.into(),
                jsonwebtoken::EncodingKey::from_rsa_pem(config.app.private_key.as_bytes())
                    .context("Failed to parse GitHub App private key")?,
            )
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Arc::new(Self { app_client }))
    }
}

#[async_trait]
impl IdentityProvider for GitHub {
    async fn authenticate(&self, installation_id: u64) -> Result<Arc<dyn Installation>> {
        // Fetch the token up front so authentication failures surface here
        let (client, _token) = self
            .app_client
            .installation_and_token(InstallationId(installation_id))
            .await
            .with_context(|| format!("Failed to authenticate as installation {installation_id}"))?;
        Ok(Arc::new(InstallationClient { client }))
    }
}

pub struct InstallationClient {
    pub client: Octocrab,
}

#[async_trait]
impl Installation for InstallationClient {
    async fn check_membership(&self, org: &str, username: &str) -> Result<Membership> {
        // 204 is a member, 404 is not, anything else is an error
        let is_member = self
            .client
            .orgs(org)
            .check_membership(username)
            .await
            .with_context(|| format!("Failed to check membership of {username} in {org}"))?;
        Ok(if is_member { Membership::Member } else { Membership::NotMember })
    }

    async fn create_check_run(&self, owner: &str, repo: &str, run: &CheckRun) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post(format!("/repos/{owner}/{repo}/check-runs"), Some(run))
            .await
            .with_context(|| format!("Failed to create check run on {owner}/{repo}@{}", run.head_sha))?;
        Ok(())
    }

    async fn search_open_pulls(&self, query: &str) -> Result<Vec<PullRef>> {
        let page = self
            .client
            .search()
            .issues_and_pull_requests(query)
            .per_page(100)
            .send()
            .await
            .with_context(|| format!("Failed to search for \"{query}\""))?;
        let issues = self.client.all_pages(page).await.context("Failed to fetch search results")?;
        let mut result = Vec::with_capacity(issues.len());
        for issue in issues {
            let Some((owner, repo)) = repo_from_url(&issue.repository_url) else {
                tracing::warn!("Search result #{} has no repository name", issue.number);
                continue;
            };
            result.push(PullRef {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number: issue.number,
            });
        }
        Ok(result)
    }

    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullHead> {
        let pull = self
            .client
            .pulls(owner, repo)
            .get(number)
            .await
            .with_context(|| format!("Failed to fetch pull request {owner}/{repo}#{number}"))?;
        Ok(PullHead {
            head_sha: pull.head.sha,
            author_login: pull.user.map(|u| u.login).unwrap_or_default(),
        })
    }
}

/// Extracts the owner and repository name from an API URL such as
/// `https://api.github.com/repos/{owner}/{repo}`.
pub fn repo_from_url(url: &url::Url) -> Option<(&str, &str)> {
    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some("repos"), Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some((owner, repo))
        }
        _ => None,
    }
}
