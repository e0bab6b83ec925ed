use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use axum::http::StatusCode;
use cla_bot_core::{config::Config, models::Agreement};
use cla_bot_github::{CheckRun, IdentityProvider, Installation, Membership, PullHead, PullRef};
use cla_bot_sign::{SignApi, SignError};

use crate::ActionContext;

const TEST_CONFIG: &str = r#"
server:
  port: 3000
github:
  app:
    id: 1
    webhook_secret: secret
    private_key: key
sign:
  client_id: sign-client
  client_secret: shh
  refresh_token: refresh
orgs:
  adobe: 1
  magento: 2
  frameio: 3
"#;

pub fn test_config() -> Config { serde_yaml::from_str(TEST_CONFIG).unwrap() }

pub fn context(github: &FakeGitHub, sign: &FakeSign) -> ActionContext {
    ActionContext {
        config: Arc::new(test_config()),
        github: Arc::new(github.clone()),
        sign: Arc::new(sign.clone()),
    }
}

#[derive(Default)]
pub struct GitHubState {
    /// (org, login) pairs that are members.
    pub members: HashSet<(String, String)>,
    pub membership_error: bool,
    pub failing_auth: HashSet<u64>,
    pub failing_search: HashSet<u64>,
    /// Installations whose search panics.
    pub panicking_search: HashSet<u64>,
    pub failing_checks: bool,
    /// Pull request numbers that fail to fetch.
    pub failing_pulls: HashSet<u64>,
    /// Search results per installation.
    pub pulls: HashMap<u64, Vec<(PullRef, PullHead)>>,
    pub calls: Vec<String>,
    pub check_runs: Vec<(String, String, CheckRun)>,
}

#[derive(Clone, Default)]
pub struct FakeGitHub {
    state: Arc<Mutex<GitHubState>>,
}

impl FakeGitHub {
    pub fn state(&self) -> MutexGuard<'_, GitHubState> { self.state.lock().unwrap() }

    pub fn calls(&self) -> Vec<String> { self.state().calls.clone() }

    pub fn check_runs(&self) -> Vec<(String, String, CheckRun)> { self.state().check_runs.clone() }

    /// Adds a search hit for `full_name` (`owner/repo`) to an installation.
    pub fn add_pull(&self, installation_id: u64, full_name: &str, number: u64, author: &str) {
        let (owner, repo) = full_name.split_once('/').unwrap();
        let pull = PullRef { owner: owner.to_string(), repo: repo.to_string(), number };
        let head = PullHead {
            head_sha: format!("{repo}-{number}-sha"),
            author_login: author.to_string(),
        };
        self.state().pulls.entry(installation_id).or_default().push((pull, head));
    }
}

#[async_trait]
impl IdentityProvider for FakeGitHub {
    async fn authenticate(&self, installation_id: u64) -> Result<Arc<dyn Installation>> {
        let mut state = self.state();
        state.calls.push(format!("authenticate {installation_id}"));
        if state.failing_auth.contains(&installation_id) {
            bail!("Bad credentials for installation {installation_id}");
        }
        Ok(Arc::new(FakeInstallation { installation_id, state: self.state.clone() }))
    }
}

struct FakeInstallation {
    installation_id: u64,
    state: Arc<Mutex<GitHubState>>,
}

#[async_trait]
impl Installation for FakeInstallation {
    async fn check_membership(&self, org: &str, username: &str) -> Result<Membership> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("check_membership {org} {username}"));
        if state.membership_error {
            bail!("Server Error");
        }
        if state.members.contains(&(org.to_string(), username.to_string())) {
            Ok(Membership::Member)
        } else {
            Ok(Membership::NotMember)
        }
    }

    async fn create_check_run(&self, owner: &str, repo: &str, run: &CheckRun) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_check_run {owner}/{repo}@{}", run.head_sha));
        if state.failing_checks {
            bail!("Resource not accessible by integration");
        }
        state.check_runs.push((owner.to_string(), repo.to_string(), run.clone()));
        Ok(())
    }

    async fn search_open_pulls(&self, query: &str) -> Result<Vec<PullRef>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("search {query}"));
        if state.panicking_search.contains(&self.installation_id) {
            drop(state);
            panic!("search exploded");
        }
        if state.failing_search.contains(&self.installation_id) {
            bail!("Validation Failed");
        }
        Ok(state
            .pulls
            .get(&self.installation_id)
            .map(|pulls| pulls.iter().map(|(pull, _)| pull.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullHead> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get_pull_request {owner}/{repo}#{number}"));
        if state.failing_pulls.contains(&number) {
            bail!("Server Error");
        }
        state
            .pulls
            .get(&self.installation_id)
            .and_then(|pulls| {
                pulls
                    .iter()
                    .find(|(p, _)| p.owner == owner && p.repo == repo && p.number == number)
                    .map(|(_, h)| h)
            })
            .cloned()
            .ok_or_else(|| anyhow!("Not Found"))
    }
}

#[derive(Default)]
pub struct SignState {
    pub agreements: Vec<Agreement>,
    /// CSV form data per agreement ID. Missing entries fail to fetch.
    pub forms: HashMap<String, String>,
    pub failing_refresh: bool,
    pub calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeSign {
    state: Arc<Mutex<SignState>>,
}

impl FakeSign {
    pub fn state(&self) -> MutexGuard<'_, SignState> { self.state.lock().unwrap() }

    pub fn calls(&self) -> Vec<String> { self.state().calls.clone() }

    pub fn add_agreement(&self, id: &str, name: &str, status: &str, usernames: &str) {
        let mut state = self.state();
        state.agreements.push(Agreement {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
        });
        state
            .forms
            .insert(id.to_string(), format!("email,githubUsername\nsomeone@example.com,{usernames}\n"));
    }
}

#[async_trait]
impl SignApi for FakeSign {
    async fn refresh_access_token(&self) -> Result<String, SignError> {
        let mut state = self.state();
        state.calls.push("refresh_access_token".to_string());
        if state.failing_refresh {
            return Err(SignError::MissingAccessToken);
        }
        Ok("token".to_string())
    }

    async fn list_agreements(
        &self,
        _access_token: &str,
        query: &str,
    ) -> Result<Vec<Agreement>, SignError> {
        let mut state = self.state();
        state.calls.push(format!("list_agreements {query}"));
        Ok(state.agreements.clone())
    }

    async fn fetch_form_data(
        &self,
        _access_token: &str,
        agreement_id: &str,
    ) -> Result<String, SignError> {
        let mut state = self.state();
        state.calls.push(format!("fetch_form_data {agreement_id}"));
        state.forms.get(agreement_id).cloned().ok_or_else(|| SignError::Status {
            status: StatusCode::NOT_FOUND,
            body: "INVALID_AGREEMENT_ID".to_string(),
        })
    }
}
