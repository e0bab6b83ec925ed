use anyhow::{Context, Result};
use cla_bot_core::{ActionResult, models::UsernameSet};
use cla_bot_sign::{SignApi, form::parse_form_data};
use futures_util::future::try_join_all;
use serde::Deserialize;
use serde_json::json;

use crate::ActionContext;

/// A single agreement ID or a list of them.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AgreementIds {
    One(String),
    Many(Vec<String>),
}

impl AgreementIds {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupParams {
    pub agreements: Option<AgreementIds>,
}

/// Resolves the GitHub usernames covered by `agreements`.
///
/// Uses `access_token` when the caller already holds one, otherwise refreshes a new one.
/// The first agreement that fails to fetch or parse fails the whole lookup.
pub async fn lookup_usernames(
    sign: &dyn SignApi,
    agreements: &[String],
    access_token: Option<&str>,
) -> Result<UsernameSet> {
    let access_token = match access_token {
        Some(token) => token.to_string(),
        None => sign
            .refresh_access_token()
            .await
            .context("Error retrieving Adobe Sign access token.")?,
    };
    let per_agreement =
        try_join_all(agreements.iter().map(|id| lookup_agreement(sign, &access_token, id)))
            .await?;
    let usernames: UsernameSet = per_agreement.into_iter().flatten().collect();
    tracing::debug!("Resolved {} usernames from {} agreements", usernames.len(), agreements.len());
    Ok(usernames)
}

async fn lookup_agreement(
    sign: &dyn SignApi,
    access_token: &str,
    agreement_id: &str,
) -> Result<Vec<String>> {
    let data = sign
        .fetch_form_data(access_token, agreement_id)
        .await
        .with_context(|| format!("Failed to fetch form data for agreement {agreement_id}"))?;
    let record = parse_form_data(&data)
        .with_context(|| format!("Failed to parse form data for agreement {agreement_id}"))?;
    Ok(record.usernames())
}

pub async fn handle_lookup(ctx: &ActionContext, params: LookupParams) -> ActionResult {
    let Some(agreements) = params.agreements else {
        return ActionResult::bad_request("param 'agreements' not found in request");
    };
    let agreements = agreements.into_vec();
    match lookup_usernames(ctx.sign.as_ref(), &agreements, None)
        .await
        .context("Error looking up GitHub usernames.")
    {
        Ok(usernames) => ActionResult::ok(json!({ "usernames": usernames })),
        Err(e) => ActionResult::internal_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::fakes::{FakeGitHub, FakeSign, context};

    #[tokio::test]
    async fn test_union_of_agreements() {
        let sign = FakeSign::default();
        sign.add_agreement("a1", "Adobe CLA", "SIGNED", "alice");
        sign.add_agreement("a2", "Adobe CLA", "SIGNED", "bob");
        let usernames =
            lookup_usernames(&sign, &["a1".to_string(), "a2".to_string()], None).await.unwrap();
        assert_eq!(usernames.iter().collect::<Vec<_>>(), ["alice", "bob"]);
        assert_eq!(sign.calls()[0], "refresh_access_token");
    }

    #[tokio::test]
    async fn test_duplicate_usernames() {
        let sign = FakeSign::default();
        sign.add_agreement("a1", "Adobe CLA", "SIGNED", "alice");
        sign.add_agreement("a2", "Adobe CLA", "SIGNED", "alice");
        let usernames =
            lookup_usernames(&sign, &["a1".to_string(), "a2".to_string()], Some("token"))
                .await
                .unwrap();
        assert_eq!(usernames.len(), 1);
        // The caller's token is reused
        assert!(!sign.calls().contains(&"refresh_access_token".to_string()));
    }

    #[tokio::test]
    async fn test_blank_form_data() {
        let sign = FakeSign::default();
        sign.state().forms.insert("a1".to_string(), "email,Custom Field 8\nx@example.com,\n".into());
        let usernames = lookup_usernames(&sign, &["a1".to_string()], Some("token")).await.unwrap();
        assert!(usernames.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_aborts() {
        let sign = FakeSign::default();
        sign.add_agreement("a1", "Adobe CLA", "SIGNED", "alice");
        let err = lookup_usernames(&sign, &["a1".to_string(), "missing".to_string()], Some("t"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch form data for agreement missing");
    }

    #[tokio::test]
    async fn test_refresh_failure() {
        let sign = FakeSign::default();
        sign.state().failing_refresh = true;
        assert!(lookup_usernames(&sign, &["a1".to_string()], None).await.is_err());
        assert_eq!(sign.calls(), ["refresh_access_token"]);
    }

    #[tokio::test]
    async fn test_handle_lookup_params() {
        let sign = FakeSign::default();
        sign.add_agreement("a1", "Adobe CLA", "SIGNED", "alice");
        let ctx = context(&FakeGitHub::default(), &sign);

        let params: LookupParams = serde_json::from_str(r#"{"agreements": "a1"}"#).unwrap();
        let result = handle_lookup(&ctx, params).await;
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.body, json!({ "usernames": ["alice"] }));

        let params: LookupParams = serde_json::from_str(r#"{"agreements": ["a1"]}"#).unwrap();
        assert_eq!(handle_lookup(&ctx, params).await.status, StatusCode::OK);

        let result = handle_lookup(&ctx, LookupParams::default()).await;
        assert_eq!(result.status, StatusCode::BAD_REQUEST);

        let params: LookupParams = serde_json::from_str(r#"{"agreements": "nope"}"#).unwrap();
        let result = handle_lookup(&ctx, params).await;
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.body["reason"], "Error looking up GitHub usernames.");
    }
}
