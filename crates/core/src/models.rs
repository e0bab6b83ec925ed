use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Other,
}

impl PullRequestAction {
    pub fn is_open(&self) -> bool { matches!(self, Self::Opened | Self::Reopened) }
}

/// The parts of a GitHub `pull_request` webhook the checker acts on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub author_login: String,
    pub org_login: String,
    pub repo_name: String,
    pub head_commit_sha: String,
    pub installation_id: u64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    #[default]
    Completed,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    ActionRequired,
    Failure,
    Neutral,
}

impl CheckConclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ActionRequired => "action_required",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for CheckConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A single check run to create. `completed_at` is stamped when the check is sent.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub installation_id: u64,
    pub org: String,
    pub repo: String,
    #[serde(alias = "sha")]
    pub commit_sha: String,
    #[serde(default)]
    pub status: CheckStatus,
    pub conclusion: CheckConclusion,
    pub title: String,
    pub summary: String,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc", alias = "start_time")]
    pub started_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl Agreement {
    /// Whether this agreement is a signed contribution agreement.
    pub fn is_eligible(&self, names: &[String]) -> bool {
        self.status.eq_ignore_ascii_case("signed") && names.iter().any(|n| n == &self.name)
    }
}

/// GitHub logins covered by one or more agreements.
///
/// Deduplicates exact matches only and keeps insertion order. Comparisons against
/// an author login should go through [`UsernameSet::contains_ignore_case`].
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsernameSet(Vec<String>);

impl UsernameSet {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, username: impl Into<String>) -> bool {
        let username = username.into();
        if self.0.contains(&username) {
            return false;
        }
        self.0.push(username);
        true
    }

    pub fn contains_ignore_case(&self, login: &str) -> bool {
        self.0.iter().any(|u| u.eq_ignore_ascii_case(login))
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
}

impl Extend<String> for UsernameSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        for username in iter {
            self.insert(username);
        }
    }
}

impl FromIterator<String> for UsernameSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct UpdatedPull {
    pub org: String,
    pub repo: String,
    pub pr_number: u64,
}

/// Outcome of a reconciliation sweep. Successes and failures are recorded independently.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub completed: Vec<UpdatedPull>,
    pub errors: Vec<String>,
}

impl ReconciliationResult {
    pub fn merge(&mut self, other: ReconciliationResult) {
        self.completed.extend(other.completed);
        self.errors.extend(other.errors);
    }
}
