pub mod agreement;
pub mod check;
pub mod lookup;
pub mod pull_request;

#[cfg(test)]
mod fakes;

use std::sync::Arc;

use anyhow::Result;
use cla_bot_core::config::Config;
use cla_bot_github::{GitHub, IdentityProvider};
use cla_bot_sign::{AdobeSign, SignApi};

/// Shared context available to all actions.
#[derive(Clone)]
pub struct ActionContext {
    pub config: Arc<Config>,
    pub github: Arc<dyn IdentityProvider>,
    pub sign: Arc<dyn SignApi>,
}

impl ActionContext {
    /// Create a context backed by the real GitHub App and Adobe Sign clients.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let github = GitHub::new(&config.github)?;
        let sign = AdobeSign::new(&config.sign);
        Ok(Self { config, github, sign })
    }
}
