use crate::constants::{network, reports, retry};
use crate::errors::ToolError;
use crate::services::logger::Logger;
use url::Url;

/// Process-wide configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: Url,
    pub request_timeout_ms: u64,
    pub auth_exchange_url: Option<Url>,
    pub auth_timeout_ms: u64,
    pub default_client_id: Option<String>,
    pub poll_max_attempts: usize,
    pub poll_interval_ms: u64,
    pub retry_max_attempts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(network::DEFAULT_API_BASE_URL)
                .expect("default API base URL is valid"),
            request_timeout_ms: network::TIMEOUT_API_REQUEST_MS,
            auth_exchange_url: None,
            auth_timeout_ms: network::TIMEOUT_AUTH_EXCHANGE_MS,
            default_client_id: None,
            poll_max_attempts: reports::POLL_MAX_ATTEMPTS,
            poll_interval_ms: reports::POLL_INTERVAL_MS,
            retry_max_attempts: retry::MAX_ATTEMPTS,
        }
    }
}

impl Settings {
    pub fn from_env(logger: &Logger) -> Result<Self, ToolError> {
        Self::from_lookup(logger, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(logger: &Logger, lookup: F) -> Result<Self, ToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let logger = logger.child("settings");
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u64| -> u64 {
            match read(key) {
                None => default,
                Some(raw) => match raw.parse::<u64>() {
                    Ok(value) if value > 0 => value,
                    _ => {
                        logger.warn(
                            "Ignoring invalid numeric setting",
                            Some(&serde_json::json!({"key": key, "value": raw, "default": default})),
                        );
                        default
                    }
                },
            }
        };

        let defaults = Settings::default();
        let api_base_url = match read("ADS_API_BASE_URL") {
            Some(raw) => parse_http_url(&raw, "ADS_API_BASE_URL")?,
            None => defaults.api_base_url,
        };
        let auth_exchange_url = read("ADS_AUTH_EXCHANGE_URL")
            .map(|raw| parse_http_url(&raw, "ADS_AUTH_EXCHANGE_URL"))
            .transpose()?;

        Ok(Self {
            api_base_url,
            request_timeout_ms: number("ADS_API_TIMEOUT_MS", defaults.request_timeout_ms),
            auth_exchange_url,
            auth_timeout_ms: number("ADS_AUTH_TIMEOUT_MS", defaults.auth_timeout_ms),
            default_client_id: read("ADS_CLIENT_ID"),
            poll_max_attempts: number(
                "ADS_REPORT_POLL_ATTEMPTS",
                defaults.poll_max_attempts as u64,
            ) as usize,
            poll_interval_ms: number("ADS_REPORT_POLL_INTERVAL_MS", defaults.poll_interval_ms),
            retry_max_attempts: number("ADS_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts as u64)
                as usize,
        })
    }

    /// Settings pointed at an arbitrary upstream host, used by local mocks.
    pub fn for_base_url(base: &str) -> Result<Self, ToolError> {
        Ok(Self {
            api_base_url: parse_http_url(base, "base URL")?,
            ..Settings::default()
        })
    }

    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "api_base_url": self.api_base_url.as_str(),
            "request_timeout_ms": self.request_timeout_ms,
            "auth_exchange_configured": self.auth_exchange_url.is_some(),
            "default_client_id_configured": self.default_client_id.is_some(),
            "poll_max_attempts": self.poll_max_attempts,
            "poll_interval_ms": self.poll_interval_ms,
            "retry_max_attempts": self.retry_max_attempts,
        })
    }
}

fn parse_http_url(raw: &str, label: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw)
        .map_err(|err| ToolError::internal(format!("{} is not a valid URL: {}", label, err)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::internal(format!(
            "{} must use http or https",
            label
        )));
    }
    Ok(url)
}
