use crate::constants::{headers, limits::ERROR_BODY_PREVIEW_BYTES, network, retry};
use crate::errors::{AdsError, ToolError};
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use crate::utils::text::body_preview;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::io::Read;
use std::time::{Duration, Instant};
use url::Url;

/// Per-call credential scope: bearer token, client id and the optional
/// advertiser profile. Immutable; rebinding a profile yields a new scope.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestScope {
    access_token: String,
    client_id: String,
    profile_id: Option<String>,
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("access_token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("profile_id", &self.profile_id)
            .finish()
    }
}

impl RequestScope {
    pub fn new(access_token: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            client_id: client_id.into(),
            profile_id: None,
        }
    }

    pub fn with_profile(&self, profile_id: impl Into<String>) -> Self {
        let profile_id = profile_id.into();
        let trimmed = profile_id.trim();
        Self {
            profile_id: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..self.clone()
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    /// Account-scoped endpoints need a bound profile; a missing one is a
    /// caller error and never reaches the network.
    pub fn require_profile(&self) -> Result<&str, AdsError> {
        self.profile_id().ok_or_else(|| {
            AdsError::validation(
                "profile_id is required for this operation; call get_profiles to find one",
            )
        })
    }

    fn headers(&self) -> Result<HeaderMap, AdsError> {
        let mut map = HeaderMap::new();
        map.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| AdsError::validation("access_token contains invalid characters"))?;
        map.insert(AUTHORIZATION, bearer);
        let client_id = HeaderValue::from_str(&self.client_id)
            .map_err(|_| AdsError::validation("client_id contains invalid characters"))?;
        map.insert(headers::CLIENT_ID, client_id);
        if let Some(profile_id) = &self.profile_id {
            let scope = HeaderValue::from_str(profile_id)
                .map_err(|_| AdsError::validation("profile_id contains invalid characters"))?;
            map.insert(headers::SCOPE, scope);
        }
        Ok(map)
    }
}

/// Authenticated client for the advertising REST API. Every failure is
/// classified into an [`AdsError`]; raw transport errors never escape.
#[derive(Clone)]
pub struct AdsClient {
    logger: Logger,
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl AdsClient {
    pub fn new(logger: Logger, settings: &Settings) -> Result<Self, ToolError> {
        let http = Client::builder()
            .user_agent(network::USER_AGENT)
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self {
            logger: logger.child("http"),
            http,
            base_url: settings.api_base_url.clone(),
            timeout: Duration::from_millis(settings.request_timeout_ms),
        })
    }

    pub async fn get(
        &self,
        scope: &RequestScope,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, AdsError> {
        self.send(scope, Method::GET, path, params, None).await
    }

    pub async fn post(
        &self,
        scope: &RequestScope,
        path: &str,
        body: &Value,
    ) -> Result<Value, AdsError> {
        self.send(scope, Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(
        &self,
        scope: &RequestScope,
        path: &str,
        body: &Value,
    ) -> Result<Value, AdsError> {
        self.send(scope, Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, scope: &RequestScope, path: &str) -> Result<Value, AdsError> {
        self.send(scope, Method::DELETE, path, &[], None).await
    }

    /// Fetches a report file from the out-of-band location returned by the
    /// status call. The location is pre-signed, so no API headers are sent.
    pub async fn download(&self, location: &str) -> Result<Value, AdsError> {
        let url = Url::parse(location)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| {
                AdsError::Contract(format!("report location is not a valid URL: {}", location))
            })?;

        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(AdsError::from)?;
        let status = response.status();
        let retry_after = read_retry_after(response.headers());
        let bytes = response.bytes().await.map_err(AdsError::from)?;
        self.logger.debug(
            "download",
            Some(&serde_json::json!({
                "status": status.as_u16(),
                "bytes": bytes.len(),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );

        let body = inflate_if_gzip(&bytes)?;
        if !status.is_success() {
            return Err(classify_status(
                status.as_u16(),
                retry_after.as_deref(),
                &String::from_utf8_lossy(&body),
            ));
        }
        serde_json::from_slice(&body)
            .map_err(|err| AdsError::Contract(format!("report file is not valid JSON: {}", err)))
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, AdsError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let mut url = Url::parse(&format!("{}{}", base, path))
            .map_err(|err| AdsError::validation(format!("invalid request path {}: {}", path, err)))?;
        if !params.is_empty() {
            let query = serde_urlencoded::to_string(params)
                .map_err(|err| AdsError::validation(format!("invalid query parameters: {}", err)))?;
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    async fn send(
        &self,
        scope: &RequestScope,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, AdsError> {
        let url = self.endpoint(path, params)?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .headers(scope.headers()?)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let err = AdsError::from(err);
                self.logger.warn(
                    "request failed",
                    Some(&serde_json::json!({"method": method.as_str(), "path": path, "error": err.to_string()})),
                );
                return Err(err);
            }
        };
        let status = response.status();
        let retry_after = read_retry_after(response.headers());
        let text = response.text().await.map_err(AdsError::from)?;
        self.logger.debug(
            "request",
            Some(&serde_json::json!({
                "method": method.as_str(),
                "path": path,
                "status": status.as_u16(),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );

        if status.is_success() {
            return Ok(parse_body(&text));
        }
        let err = classify_status(status.as_u16(), retry_after.as_deref(), &text);
        self.logger.warn(
            "upstream rejected request",
            Some(&serde_json::json!({
                "method": method.as_str(),
                "path": path,
                "status": status.as_u16(),
                "kind": err.kind().as_str(),
            })),
        );
        Err(err)
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn read_retry_after(map: &HeaderMap) -> Option<String> {
    map.get(headers::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn inflate_if_gzip(bytes: &[u8]) -> Result<Vec<u8>, AdsError> {
    if bytes.len() < 2 || bytes[0] != 0x1f || bytes[1] != 0x8b {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|err| AdsError::Contract(format!("report file is not valid gzip: {}", err)))?;
    Ok(out)
}

fn application_error(body: &Value) -> Option<(String, String)> {
    let code = match body.get("code")? {
        Value::String(code) if !code.trim().is_empty() => code.trim().to_string(),
        Value::Number(code) => code.to_string(),
        _ => return None,
    };
    let details = ["details", "message", "description"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("")
        .to_string();
    Some((code, details))
}

/// Maps a non-success upstream status (plus its body and `Retry-After`) onto
/// the error taxonomy.
pub fn classify_status(status: u16, retry_after: Option<&str>, body: &str) -> AdsError {
    let parsed = parse_body(body);
    let app_error = application_error(&parsed);
    let detail = app_error
        .as_ref()
        .map(|(code, details)| {
            if details.is_empty() {
                code.clone()
            } else {
                format!("{}: {}", code, details)
            }
        })
        .unwrap_or_else(|| {
            let preview = body_preview(body, ERROR_BODY_PREVIEW_BYTES);
            if preview.is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("no details")
                    .to_string()
            } else {
                preview
            }
        });

    match status {
        401 => AdsError::Auth(detail),
        403 => AdsError::Forbidden(detail),
        429 => AdsError::RateLimited {
            retry_after_secs: retry_after
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(retry::DEFAULT_RETRY_AFTER_SECS),
        },
        s if s >= 500 => AdsError::UpstreamServer {
            status: s,
            message: detail,
        },
        s => match app_error {
            Some((code, details)) => AdsError::UpstreamApplication {
                status: s,
                code,
                details,
            },
            None => AdsError::UpstreamApplication {
                status: s,
                code: format!("HTTP_{}", s),
                details: detail,
            },
        },
    }
}
