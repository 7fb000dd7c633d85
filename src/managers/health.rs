use crate::errors::{AdsErrorKind, ToolError};
use crate::services::ads_client::AdsClient;
use crate::services::credentials::CredentialResolver;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Status for a failed probe: credential problems degrade, anything else
/// means the upstream is not usable.
pub fn status_for_failure(kind: AdsErrorKind) -> HealthStatus {
    match kind {
        AdsErrorKind::Auth
        | AdsErrorKind::Forbidden
        | AdsErrorKind::Credential
        | AdsErrorKind::Validation => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    }
}

/// `healthcheck`: never fails for upstream conditions, only reports them.
pub struct HealthManager {
    logger: Logger,
    settings: Settings,
    credentials: Arc<CredentialResolver>,
    client: AdsClient,
    started: Instant,
}

impl HealthManager {
    pub fn new(
        logger: Logger,
        settings: Settings,
        credentials: Arc<CredentialResolver>,
        client: AdsClient,
    ) -> Self {
        Self {
            logger,
            settings,
            credentials,
            client,
            started: Instant::now(),
        }
    }

    async fn probe(&self, args: &Value) -> (HealthStatus, Value) {
        let has_credentials = args
            .get("user_credentials")
            .map(|v| !v.is_null())
            .unwrap_or(false);
        if !has_credentials {
            return (
                HealthStatus::Degraded,
                serde_json::json!({"status": "skipped", "reason": "no user_credentials supplied"}),
            );
        }

        let started = Instant::now();
        let result = match self.credentials.resolve(args).await {
            Ok(scope) => self.client.get(&scope, "/v2/profiles", &[]).await,
            Err(err) => Err(err),
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(profiles) => (
                HealthStatus::Healthy,
                serde_json::json!({
                    "status": "ok",
                    "latency_ms": latency_ms,
                    "profiles": profiles.as_array().map(|a| a.len()).unwrap_or(0),
                }),
            ),
            Err(err) => {
                let kind = err.kind();
                self.logger.warn(
                    "upstream probe failed",
                    Some(&serde_json::json!({"kind": kind.as_str(), "error": err.to_string()})),
                );
                (
                    status_for_failure(kind),
                    serde_json::json!({
                        "status": "failed",
                        "latency_ms": latency_ms,
                        "kind": kind.as_str(),
                        "message": err.to_string(),
                    }),
                )
            }
        }
    }

    pub async fn check(&self, args: Value) -> Result<Value, ToolError> {
        let (status, upstream) = self.probe(&args).await;
        let mut configuration = self.settings.summary();
        configuration["status"] = Value::String("ok".into());
        Ok(serde_json::json!({
            "status": status,
            "checks": {
                "configuration": configuration,
                "upstream": upstream,
            },
            "server": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "uptime_ms": self.started.elapsed().as_millis() as u64,
            },
            "logging": self.logger.stats(),
        }))
    }
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for HealthManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.check(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_map_to_status() {
        assert_eq!(status_for_failure(AdsErrorKind::Auth), HealthStatus::Degraded);
        assert_eq!(status_for_failure(AdsErrorKind::Credential), HealthStatus::Degraded);
        assert_eq!(status_for_failure(AdsErrorKind::Transport), HealthStatus::Unhealthy);
        assert_eq!(
            status_for_failure(AdsErrorKind::UpstreamServer),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn missing_credentials_degrade_without_probing() {
        let logger = Logger::new("test");
        let settings = Settings::default();
        let manager = HealthManager::new(
            logger.clone(),
            settings.clone(),
            Arc::new(CredentialResolver::new(logger.clone(), &settings).unwrap()),
            AdsClient::new(logger, &settings).unwrap(),
        );
        let report = manager.check(serde_json::json!({})).await.unwrap();
        assert_eq!(report["status"], "degraded");
        assert_eq!(report["checks"]["upstream"]["status"], "skipped");
        assert_eq!(report["checks"]["configuration"]["status"], "ok");
        assert_eq!(report["server"]["name"], "ads-mcp");
    }
}
