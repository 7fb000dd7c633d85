use crate::constants::network;
use crate::errors::{AdsError, ToolError};
use crate::services::ads_client::RequestScope;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Turns the `user_credentials` argument of a tool call into a
/// [`RequestScope`]. Accepts a direct bearer token or a session token that
/// is exchanged against the configured auth service.
#[derive(Clone)]
pub struct CredentialResolver {
    logger: Logger,
    http: Client,
    exchange_url: Option<Url>,
    exchange_timeout: Duration,
    default_client_id: Option<String>,
}

impl CredentialResolver {
    pub fn new(logger: Logger, settings: &Settings) -> Result<Self, ToolError> {
        let http = Client::builder()
            .user_agent(network::USER_AGENT)
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self {
            logger: logger.child("credentials"),
            http,
            exchange_url: settings.auth_exchange_url.clone(),
            exchange_timeout: Duration::from_millis(settings.auth_timeout_ms),
            default_client_id: settings.default_client_id.clone(),
        })
    }

    pub async fn resolve(&self, args: &Value) -> Result<RequestScope, AdsError> {
        let credentials = args
            .get("user_credentials")
            .filter(|v| !v.is_null())
            .ok_or_else(|| AdsError::validation("user_credentials is required"))?;
        let object = credentials
            .as_object()
            .ok_or_else(|| AdsError::validation("user_credentials must be an object"))?;
        let explicit_profile = text(credentials, "profile_id");

        let (scope, exchanged_profile) = if let Some(token) = text(credentials, "access_token") {
            (self.direct_scope(token, text(credentials, "client_id"))?, None)
        } else if object.contains_key("session_token") {
            let session_token = text(credentials, "session_token").ok_or_else(|| {
                AdsError::validation("user_credentials.session_token must be a non-empty string")
            })?;
            let platform_id = text(credentials, "platform_id").ok_or_else(|| {
                AdsError::validation("user_credentials.platform_id is required with session_token")
            })?;
            self.exchange(session_token, platform_id).await?
        } else {
            return Err(AdsError::validation(
                "user_credentials must contain access_token or session_token",
            ));
        };

        Ok(match explicit_profile.or(exchanged_profile) {
            Some(profile_id) => scope.with_profile(profile_id),
            None => scope,
        })
    }

    fn direct_scope(
        &self,
        access_token: String,
        client_id: Option<String>,
    ) -> Result<RequestScope, AdsError> {
        let client_id = client_id
            .or_else(|| self.default_client_id.clone())
            .ok_or_else(|| {
                AdsError::validation(
                    "user_credentials.client_id is required when ADS_CLIENT_ID is not configured",
                )
            })?;
        Ok(RequestScope::new(access_token, client_id))
    }

    async fn exchange(
        &self,
        session_token: String,
        platform_id: String,
    ) -> Result<(RequestScope, Option<String>), AdsError> {
        let url = self.exchange_url.clone().ok_or_else(|| {
            AdsError::Credential(
                "session exchange is not configured; set ADS_AUTH_EXCHANGE_URL".into(),
            )
        })?;
        let body = serde_json::json!({
            "session_token": session_token,
            "platform_id": platform_id,
        });

        let response = tokio::time::timeout(
            self.exchange_timeout,
            self.http.post(url).json(&body).send(),
        )
        .await
        .map_err(|_| AdsError::Credential("session exchange timed out".into()))?
        .map_err(|err| AdsError::Credential(format!("session exchange failed: {}", err)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            self.logger.warn(
                "session exchange rejected",
                Some(&serde_json::json!({"status": status, "platform_id": platform_id})),
            );
            return Err(AdsError::Credential(match status {
                404 => "session not found".to_string(),
                400 | 401 | 403 => "invalid session or platform".to_string(),
                other => format!("session exchange returned HTTP {}", other),
            }));
        }

        let payload: Value = response.json().await.map_err(|err| {
            AdsError::Credential(format!("session exchange returned invalid JSON: {}", err))
        })?;
        let access_token = text(&payload, "access_token").ok_or_else(|| {
            AdsError::Credential("session exchange response has no access_token".into())
        })?;
        let scope = self.direct_scope(access_token, text(&payload, "client_id"))?;
        self.logger.debug(
            "session exchanged",
            Some(&serde_json::json!({"platform_id": platform_id})),
        );
        Ok((scope, text(&payload, "profile_id")))
    }
}

/// Reads a string or integer field as trimmed text; profile ids arrive as
/// both.
fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
