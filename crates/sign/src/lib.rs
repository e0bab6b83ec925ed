pub mod form;

use std::sync::Arc;

use async_trait::async_trait;
use cla_bot_core::{config::SignConfig, models::Agreement, util::UrlExt};
use reqwest::{StatusCode, header};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("Adobe Sign responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Adobe Sign response did not contain an access token")]
    MissingAccessToken,
}

/// The Adobe Sign REST calls the checker depends on.
#[async_trait]
pub trait SignApi: Send + Sync {
    /// Exchange the configured refresh token for a short-lived access token.
    async fn refresh_access_token(&self) -> Result<String, SignError>;

    /// Agreements visible to the integration that match `query`.
    async fn list_agreements(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<Agreement>, SignError>;

    /// Raw CSV form data export for one agreement.
    async fn fetch_form_data(
        &self,
        access_token: &str,
        agreement_id: &str,
    ) -> Result<String, SignError>;
}

pub struct AdobeSign {
    client: reqwest::Client,
    config: SignConfig,
}

impl AdobeSign {
    pub fn new(config: &SignConfig) -> Arc<Self> {
        Arc::new(Self { client: reqwest::Client::new(), config: config.clone() })
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAgreementList {
    #[serde(default)]
    user_agreement_list: Vec<UserAgreement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAgreement {
    agreement_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

impl From<UserAgreement> for Agreement {
    fn from(value: UserAgreement) -> Self {
        Self { id: value.agreement_id, name: value.name, status: value.status }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SignError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SignError::Status { status, body })
}

#[async_trait]
impl SignApi for AdobeSign {
    async fn refresh_access_token(&self) -> Result<String, SignError> {
        let response = self
            .client
            .post(self.config.oauth_url.with_path("/oauth/refresh"))
            .header(header::CACHE_CONTROL, "no-cache")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .send()
            .await?;
        let response: RefreshResponse = check_status(response).await?.json().await?;
        response.access_token.filter(|t| !t.is_empty()).ok_or(SignError::MissingAccessToken)
    }

    async fn list_agreements(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<Agreement>, SignError> {
        let url = self
            .config
            .api_url
            .with_path("/api/rest/v5/agreements")
            .query_param("query", Some(query));
        let response = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .header("Access-Token", access_token)
            .send()
            .await?;
        let list: UserAgreementList = check_status(response).await?.json().await?;
        tracing::debug!("Found {} agreements for query {}", list.user_agreement_list.len(), query);
        Ok(list.user_agreement_list.into_iter().map(Agreement::from).collect())
    }

    async fn fetch_form_data(
        &self,
        access_token: &str,
        agreement_id: &str,
    ) -> Result<String, SignError> {
        let url =
            self.config.api_url.with_path(&format!("/api/rest/v5/agreements/{agreement_id}/formData"));
        let response = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(check_status(response).await?.text().await?)
    }
}
