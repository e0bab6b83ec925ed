use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "CLA_BOT_CONFIG";

/// Organization login to GitHub App installation ID.
pub type MonitoredOrgs = BTreeMap<String, u64>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub sign: SignConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub orgs: MonitoredOrgs,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Config {
    /// Loads the file named by `CLA_BOT_CONFIG`, falling back to `config.yml`.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.yml"));
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    pub app: GitHubAppConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubAppConfig {
    pub id: u64,
    pub webhook_secret: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_oauth_url")]
    pub oauth_url: Url,
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// Agreement names that count as a contribution agreement.
    #[serde(default = "default_agreement_names")]
    pub agreement_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckConfig {
    #[serde(default = "default_check_name")]
    pub name: String,
    #[serde(default = "default_details_url")]
    pub details_url: String,
}

impl Default for CheckConfig {
    fn default() -> Self { Self { name: default_check_name(), details_url: default_details_url() } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// Maximum in-flight organizations, and separately in-flight pull requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self { Self { concurrency: default_concurrency() } }
}

fn default_oauth_url() -> Url {
    Url::parse("https://api.na2.echosign.com").expect("valid default OAuth URL")
}

fn default_api_url() -> Url {
    Url::parse("https://api.na1.echosign.com").expect("valid default API URL")
}

fn default_agreement_names() -> Vec<String> {
    vec!["Adobe Contributor License Agreement".to_string(), "Adobe CLA".to_string()]
}

fn default_check_name() -> String { "Adobe CLA Signed?".to_string() }

fn default_details_url() -> String { "http://opensource.adobe.com/cla.html".to_string() }

fn default_concurrency() -> usize { 10 }
