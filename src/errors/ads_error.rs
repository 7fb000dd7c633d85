use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable classification tag carried by every [`AdsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdsErrorKind {
    Validation,
    Auth,
    Forbidden,
    RateLimited,
    UpstreamServer,
    UpstreamApplication,
    Transport,
    Upstream,
    Timeout,
    Credential,
}

impl AdsErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdsErrorKind::Validation => "VALIDATION",
            AdsErrorKind::Auth => "AUTH",
            AdsErrorKind::Forbidden => "FORBIDDEN",
            AdsErrorKind::RateLimited => "RATE_LIMITED",
            AdsErrorKind::UpstreamServer => "UPSTREAM_SERVER",
            AdsErrorKind::UpstreamApplication => "UPSTREAM_APPLICATION",
            AdsErrorKind::Transport => "TRANSPORT",
            AdsErrorKind::Upstream => "UPSTREAM",
            AdsErrorKind::Timeout => "TIMEOUT",
            AdsErrorKind::Credential => "CREDENTIAL",
        }
    }
}

impl fmt::Display for AdsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the advertising API request layer and the report workflow.
#[derive(Debug, Clone, Error)]
pub enum AdsError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed: access token is invalid or expired ({0})")]
    Auth(String),

    #[error("Access forbidden: {0}. Check that profile_id belongs to the account behind this token")]
    Forbidden(String),

    #[error("Rate limited by upstream API; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upstream server error (HTTP {status}): {message}")]
    UpstreamServer { status: u16, message: String },

    #[error("Upstream API error {code} (HTTP {status}): {details}")]
    UpstreamApplication {
        status: u16,
        code: String,
        details: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Report {report_id} failed: {details}")]
    ReportFailed { report_id: String, details: String },

    #[error("Report {report_id} did not complete: max attempts reached ({attempts})")]
    ReportTimeout { report_id: String, attempts: usize },

    #[error("Upstream contract violation: {0}")]
    Contract(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

impl AdsError {
    pub fn validation(message: impl Into<String>) -> Self {
        AdsError::Validation(message.into())
    }

    pub fn kind(&self) -> AdsErrorKind {
        match self {
            AdsError::Validation(_) => AdsErrorKind::Validation,
            AdsError::Auth(_) => AdsErrorKind::Auth,
            AdsError::Forbidden(_) => AdsErrorKind::Forbidden,
            AdsError::RateLimited { .. } => AdsErrorKind::RateLimited,
            AdsError::UpstreamServer { .. } => AdsErrorKind::UpstreamServer,
            AdsError::UpstreamApplication { .. } => AdsErrorKind::UpstreamApplication,
            AdsError::Transport(_) => AdsErrorKind::Transport,
            AdsError::ReportFailed { .. } | AdsError::Contract(_) => AdsErrorKind::Upstream,
            AdsError::ReportTimeout { .. } => AdsErrorKind::Timeout,
            AdsError::Credential(_) => AdsErrorKind::Credential,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            AdsError::Auth(_) => Some(401),
            AdsError::Forbidden(_) => Some(403),
            AdsError::RateLimited { .. } => Some(429),
            AdsError::UpstreamServer { status, .. } => Some(*status),
            AdsError::UpstreamApplication { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-directed delay for rate-limit responses.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AdsError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Conditions the general backoff policy may retry: 5xx, transport, 429.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            AdsErrorKind::RateLimited | AdsErrorKind::UpstreamServer | AdsErrorKind::Transport
        )
    }
}

impl From<reqwest::Error> for AdsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AdsError::Transport(format!("request timed out: {}", err));
        }
        AdsError::Transport(err.to_string())
    }
}
