use super::ads_error::{AdsError, AdsErrorKind};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    Upstream,
    Timeout,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, ToolErrorKind::Timeout),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }

    pub fn http_status(&self) -> Option<u64> {
        self.details
            .as_ref()
            .and_then(|d| d.get("http_status"))
            .and_then(|v| v.as_u64())
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

impl From<AdsError> for ToolError {
    fn from(err: AdsError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        if kind == AdsErrorKind::Validation {
            return ToolError::invalid_params(message);
        }

        let tool_kind = match kind {
            AdsErrorKind::Timeout => ToolErrorKind::Timeout,
            _ => ToolErrorKind::Upstream,
        };
        let hint = match kind {
            AdsErrorKind::Auth => Some("Refresh the access token and retry."),
            AdsErrorKind::Forbidden => {
                Some("Verify profile_id with get_profiles; it must belong to this token's account.")
            }
            AdsErrorKind::RateLimited => Some("Wait for the retry-after window before calling again."),
            AdsErrorKind::Timeout => {
                Some("The report may still complete upstream; request it again later.")
            }
            AdsErrorKind::Credential => Some("Obtain a fresh session token and retry."),
            _ => None,
        };

        let mut details = serde_json::json!({
            "error_kind": kind.as_str(),
            "http_status": err.http_status(),
        });
        if let (Some(obj), Some(secs)) = (details.as_object_mut(), err.retry_after_secs()) {
            obj.insert("retry_after_secs".to_string(), Value::from(secs));
        }
        if let AdsError::UpstreamApplication { code, .. } = &err {
            if let Some(obj) = details.as_object_mut() {
                obj.insert("upstream_code".to_string(), Value::String(code.clone()));
            }
        }

        let mut out = ToolError::new(tool_kind, kind.as_str(), message)
            .with_details(details)
            .with_retryable(err.is_transient() || kind == AdsErrorKind::Timeout);
        if let Some(hint) = hint {
            out = out.with_hint(hint);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_invalid_params() {
        let err: ToolError = AdsError::validation("profile_id is required").into();
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
        assert_eq!(err.message, "profile_id is required");
        assert!(!err.retryable);
    }

    #[test]
    fn upstream_errors_keep_status_and_code() {
        let err: ToolError = AdsError::UpstreamApplication {
            status: 400,
            code: "INVALID_ARGUMENT".into(),
            details: "bad metric".into(),
        }
        .into();
        assert_eq!(err.kind, ToolErrorKind::Upstream);
        assert_eq!(err.code, "UPSTREAM_APPLICATION");
        assert_eq!(err.http_status(), Some(400));
        assert_eq!(
            err.details.as_ref().and_then(|d| d.get("upstream_code")),
            Some(&Value::String("INVALID_ARGUMENT".into()))
        );
    }

    #[test]
    fn rate_limit_is_retryable_with_delay() {
        let err: ToolError = AdsError::RateLimited {
            retry_after_secs: 12,
        }
        .into();
        assert!(err.retryable);
        assert_eq!(
            err.details
                .as_ref()
                .and_then(|d| d.get("retry_after_secs"))
                .and_then(|v| v.as_u64()),
            Some(12)
        );
    }

    #[test]
    fn report_timeout_maps_to_timeout_kind() {
        let err: ToolError = AdsError::ReportTimeout {
            report_id: "r".into(),
            attempts: 3,
        }
        .into();
        assert_eq!(err.kind, ToolErrorKind::Timeout);
        assert_eq!(err.code, "TIMEOUT");
    }
}
