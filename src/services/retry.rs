use crate::constants::retry as retry_constants;
use crate::errors::AdsError;
use crate::services::logger::Logger;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::MAX_ATTEMPTS,
            initial_delay_ms: retry_constants::INITIAL_DELAY_MS,
            multiplier: retry_constants::MULTIPLIER,
            max_delay_ms: retry_constants::MAX_DELAY_MS,
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// `min(initial * multiplier^retry, max)` where `retry` counts from zero.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let raw = (self.initial_delay_ms as f64) * self.multiplier.powi(retry as i32);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Retries transient failures (5xx, transport, rate limit) with exponential
/// backoff. Auth, scope and other 4xx classifications fail on the first
/// attempt. On exhaustion the last error is returned unchanged.
pub async fn with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    logger: &Logger,
    label: &str,
    mut operation: F,
) -> Result<T, AdsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdsError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_transient() || attempt >= max_attempts {
            return Err(err);
        }
        let mut delay = policy.delay_for(attempt - 1);
        if let Some(secs) = err.retry_after_secs() {
            delay = delay.max(Duration::from_secs(secs));
        }
        logger.warn(
            "retrying after transient failure",
            Some(&serde_json::json!({
                "operation": label,
                "attempt": attempt,
                "max_attempts": max_attempts,
                "kind": err.kind().as_str(),
                "delay_ms": delay.as_millis() as u64,
            })),
        );
        tokio::time::sleep(delay).await;
    }
}

/// Retries only rate-limit rejections, waiting the server-supplied
/// `Retry-After` when present and `1000ms * 2^retry` otherwise. Any other
/// error propagates immediately.
pub async fn with_rate_limit_backoff<T, F, Fut>(
    max_attempts: usize,
    logger: &Logger,
    label: &str,
    mut operation: F,
) -> Result<T, AdsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdsError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let retry_after = match &err {
            AdsError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => return Err(err),
        };
        if attempt >= max_attempts {
            return Err(err);
        }
        let delay = if retry_after > 0 {
            Duration::from_secs(retry_after)
        } else {
            rate_limit_fallback_delay(attempt - 1)
        };
        logger.warn(
            "rate limited, backing off",
            Some(&serde_json::json!({
                "operation": label,
                "attempt": attempt,
                "delay_ms": delay.as_millis() as u64,
            })),
        );
        tokio::time::sleep(delay).await;
    }
}

/// `1000ms * 2^retry`, capped at the general backoff ceiling.
fn rate_limit_fallback_delay(retry: usize) -> Duration {
    let factor = u32::try_from(retry)
        .ok()
        .and_then(|exp| 2u64.checked_pow(exp))
        .unwrap_or(u64::MAX);
    let millis = retry_constants::INITIAL_DELAY_MS
        .saturating_mul(factor)
        .min(retry_constants::MAX_DELAY_MS);
    Duration::from_millis(millis)
}
