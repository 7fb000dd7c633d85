use crate::errors::ToolError;
use crate::services::ads_client::AdsClient;
use crate::services::credentials::CredentialResolver;
use crate::services::logger::Logger;
use crate::services::retry::{with_backoff, BackoffPolicy};
use crate::services::validation::Validation;
use serde_json::Value;
use std::sync::Arc;

/// `get_profiles`: lists the advertiser profiles reachable with the token.
/// Needs no profile scope; it is how callers discover one.
#[derive(Clone)]
pub struct ProfilesManager {
    logger: Logger,
    validation: Validation,
    credentials: Arc<CredentialResolver>,
    client: AdsClient,
    policy: BackoffPolicy,
}

impl ProfilesManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        credentials: Arc<CredentialResolver>,
        client: AdsClient,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            logger: logger.child("profiles"),
            validation,
            credentials,
            client,
            policy,
        }
    }

    pub async fn list(&self, args: Value) -> Result<Value, ToolError> {
        let country_code = self
            .validation
            .ensure_optional_string(args.get("country_code"), "country_code")?;
        let account_type = self
            .validation
            .ensure_optional_string(args.get("account_type"), "account_type")?;
        let scope = self.credentials.resolve(&args).await?;

        let response = with_backoff(&self.policy, &self.logger, "get_profiles", || {
            self.client.get(&scope, "/v2/profiles", &[])
        })
        .await?;
        let profiles = match response {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ToolError::new(
                    crate::errors::ToolErrorKind::Upstream,
                    "UPSTREAM",
                    format!("profiles response is not an array: {}", other),
                ))
            }
        };

        let items: Vec<Value> = profiles
            .into_iter()
            .filter(|profile| matches_filter(profile.get("countryCode"), country_code.as_deref()))
            .filter(|profile| {
                matches_filter(
                    profile.get("accountInfo").and_then(|info| info.get("type")),
                    account_type.as_deref(),
                )
            })
            .collect();
        Ok(serde_json::json!({"items": items, "count": items.len()}))
    }
}

fn matches_filter(field: Option<&Value>, wanted: Option<&str>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    field
        .and_then(|v| v.as_str())
        .map(|v| v.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for ProfilesManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.list(args).await
    }
}
