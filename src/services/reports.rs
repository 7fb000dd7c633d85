//! Asynchronous report workflow: submit, poll until terminal, download.

use crate::constants::reports as report_constants;
use crate::errors::AdsError;
use crate::services::ads_client::{AdsClient, RequestScope};
use crate::services::logger::Logger;
use crate::services::metrics::{normalize_rows, summarize, Granularity, NormalizedRow, Summary};
use crate::services::retry::with_rate_limit_backoff;
use crate::services::settings::Settings;
use crate::utils::dates::parse_compact;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CampaignType {
    #[serde(rename = "sp")]
    SponsoredProducts,
    #[serde(rename = "sb")]
    SponsoredBrands,
    #[serde(rename = "sd")]
    SponsoredDisplay,
}

impl CampaignType {
    pub const ALL: [CampaignType; 3] = [
        CampaignType::SponsoredProducts,
        CampaignType::SponsoredBrands,
        CampaignType::SponsoredDisplay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CampaignType::SponsoredProducts => "sp",
            CampaignType::SponsoredBrands => "sb",
            CampaignType::SponsoredDisplay => "sd",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportType {
    Campaigns,
    AdGroups,
    Keywords,
    ProductAds,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Campaigns,
        ReportType::AdGroups,
        ReportType::Keywords,
        ReportType::ProductAds,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Campaigns => "campaigns",
            ReportType::AdGroups => "adGroups",
            ReportType::Keywords => "keywords",
            ReportType::ProductAds => "productAds",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
    }

    pub fn granularity(self) -> Granularity {
        match self {
            ReportType::Campaigns => Granularity::Campaign,
            ReportType::AdGroups => Granularity::AdGroup,
            ReportType::Keywords => Granularity::Keyword,
            ReportType::ProductAds => Granularity::ProductAd,
        }
    }

    pub fn supports(self, campaign_type: CampaignType) -> bool {
        match campaign_type {
            CampaignType::SponsoredProducts => true,
            CampaignType::SponsoredBrands => self != ReportType::ProductAds,
            CampaignType::SponsoredDisplay => self != ReportType::Keywords,
        }
    }

    pub fn default_metrics(self, campaign_type: CampaignType) -> Vec<&'static str> {
        let mut metrics: Vec<&'static str> = match self {
            ReportType::Campaigns => vec!["campaignId", "campaignName"],
            ReportType::AdGroups => vec!["adGroupId", "adGroupName", "campaignId", "campaignName"],
            ReportType::Keywords => vec![
                "keywordId",
                "keywordText",
                "matchType",
                "adGroupId",
                "campaignId",
            ],
            ReportType::ProductAds => vec!["adId", "asin", "sku", "adGroupId", "campaignId"],
        };
        metrics.extend([
            "impressions",
            "clicks",
            "cost",
            "attributedSales14d",
            "attributedConversions14d",
        ]);
        metrics.push(match campaign_type {
            CampaignType::SponsoredBrands => "unitsSold14d",
            _ => "attributedUnitsOrdered14d",
        });
        metrics
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    Summary,
    Daily,
}

impl TimeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Summary => "SUMMARY",
            TimeUnit::Daily => "DAILY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "SUMMARY" => Some(TimeUnit::Summary),
            "DAILY" => Some(TimeUnit::Daily),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub report_type: ReportType,
    pub campaign_type: CampaignType,
    pub start_date: String,
    pub end_date: String,
    pub metrics: Option<Vec<String>>,
    pub time_unit: Option<TimeUnit>,
    pub state_filter: Option<String>,
    pub campaign_ids: Vec<String>,
}

impl ReportRequest {
    pub fn new(
        report_type: ReportType,
        campaign_type: CampaignType,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
    ) -> Self {
        Self {
            report_type,
            campaign_type,
            start_date: start_date.into(),
            end_date: end_date.into(),
            metrics: None,
            time_unit: None,
            state_filter: None,
            campaign_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), AdsError> {
        let start = parse_compact(&self.start_date).ok_or_else(|| {
            AdsError::validation(format!(
                "start_date must be a valid YYYYMMDD date, got {:?}",
                self.start_date
            ))
        })?;
        let end = parse_compact(&self.end_date).ok_or_else(|| {
            AdsError::validation(format!(
                "end_date must be a valid YYYYMMDD date, got {:?}",
                self.end_date
            ))
        })?;
        if start > end {
            return Err(AdsError::validation(
                "start_date must not be after end_date",
            ));
        }
        if !self.report_type.supports(self.campaign_type) {
            return Err(AdsError::validation(format!(
                "report_type {} is not available for campaign_type {}",
                self.report_type.as_str(),
                self.campaign_type.as_str()
            )));
        }
        if let Some(metrics) = &self.metrics {
            if metrics.iter().all(|m| m.trim().is_empty()) {
                return Err(AdsError::validation("metrics must not be empty when provided"));
            }
        }
        Ok(())
    }

    pub fn endpoint(&self) -> String {
        format!(
            "/v2/{}/{}/report",
            self.campaign_type.as_str(),
            self.report_type.as_str()
        )
    }

    pub fn metric_list(&self) -> Vec<String> {
        match &self.metrics {
            Some(metrics) => metrics
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            None => self
                .report_type
                .default_metrics(self.campaign_type)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn body(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("startDate".into(), Value::String(self.start_date.clone()));
        body.insert("endDate".into(), Value::String(self.end_date.clone()));
        body.insert("metrics".into(), Value::String(self.metric_list().join(",")));
        if let Some(unit) = self.time_unit {
            body.insert("timeUnit".into(), Value::String(unit.as_str().into()));
        }
        if let Some(state) = self.state_filter.as_deref().filter(|s| !s.trim().is_empty()) {
            body.insert("stateFilter".into(), Value::String(state.trim().to_string()));
        }
        if !self.campaign_ids.is_empty() {
            body.insert(
                "campaignIdFilter".into(),
                Value::String(self.campaign_ids.join(",")),
            );
        }
        Value::Object(body)
    }
}

/// Lifecycle of a submitted report job. `Timeout` is entered locally when
/// the polling budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    InProgress,
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    InProgress,
    Success {
        location: Option<String>,
        file_size: Option<u64>,
        expires_at: Option<String>,
    },
    Failure {
        details: String,
    },
}

impl ReportStatus {
    pub fn from_payload(payload: &Value) -> Result<Self, AdsError> {
        let raw = payload
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdsError::Contract("report status response has no status".into()))?;
        let text = |key: &str| {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        match raw.trim().to_uppercase().as_str() {
            "IN_PROGRESS" | "PENDING" | "PROCESSING" => Ok(ReportStatus::InProgress),
            "SUCCESS" | "COMPLETED" => Ok(ReportStatus::Success {
                location: text("location").or_else(|| text("url")),
                file_size: payload.get("fileSize").and_then(|v| v.as_u64()),
                expires_at: text("expiresAt").or_else(|| text("expiration")),
            }),
            "FAILURE" | "FAILED" => Ok(ReportStatus::Failure {
                details: text("statusDetails")
                    .or_else(|| text("failureReason"))
                    .unwrap_or_else(|| "no details provided".to_string()),
            }),
            other => Err(AdsError::Contract(format!(
                "unknown report status {:?}",
                other
            ))),
        }
    }

    pub fn state(&self) -> JobState {
        match self {
            ReportStatus::InProgress => JobState::InProgress,
            ReportStatus::Success { .. } => JobState::Success,
            ReportStatus::Failure { .. } => JobState::Failure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: usize,
    pub interval: Duration,
    pub rate_limit_attempts: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: report_constants::POLL_MAX_ATTEMPTS,
            interval: Duration::from_millis(report_constants::POLL_INTERVAL_MS),
            rate_limit_attempts: crate::constants::retry::MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.poll_max_attempts,
            interval: Duration::from_millis(settings.poll_interval_ms),
            rate_limit_attempts: settings.retry_max_attempts,
        }
    }
}

/// The downloaded dataset of a successful job.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report_id: String,
    pub polls: usize,
    pub file_size: Option<u64>,
    pub expires_at: Option<String>,
    pub rows: Vec<Value>,
}

impl ReportOutcome {
    pub fn normalize(&self, report_type: ReportType) -> (Vec<NormalizedRow>, Summary) {
        let rows = normalize_rows(report_type.granularity(), &self.rows);
        let summary = summarize(&rows);
        (rows, summary)
    }
}

pub struct ReportWorkflow {
    client: AdsClient,
    logger: Logger,
    poll: PollConfig,
}

impl ReportWorkflow {
    pub fn new(client: AdsClient, logger: Logger, poll: PollConfig) -> Self {
        Self {
            client,
            logger: logger.child("reports"),
            poll,
        }
    }

    /// Runs one report job to completion. Validation failures return before
    /// any request is made; everything else surfaces as a classified error.
    pub async fn run(
        &self,
        scope: &RequestScope,
        request: &ReportRequest,
    ) -> Result<ReportOutcome, AdsError> {
        scope.require_profile()?;
        request.validate()?;

        let report_id = self.submit(scope, request).await?;
        let (status, polls) = self.poll_until_terminal(scope, &report_id).await?;
        let ReportStatus::Success {
            location,
            file_size,
            expires_at,
        } = status
        else {
            return Err(AdsError::Contract(format!(
                "report {} left polling without success",
                report_id
            )));
        };
        let location = location.ok_or_else(|| {
            AdsError::Contract(format!(
                "report {} succeeded without a download location",
                report_id
            ))
        })?;

        let rows = match self.client.download(&location).await? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            item @ Value::Object(_) => vec![item],
            other => {
                return Err(AdsError::Contract(format!(
                    "report {} file is not a JSON object or array ({})",
                    report_id,
                    value_type_name(&other)
                )))
            }
        };
        self.logger.info(
            "report downloaded",
            Some(&serde_json::json!({"report_id": report_id, "rows": rows.len(), "polls": polls})),
        );

        Ok(ReportOutcome {
            report_id,
            polls,
            file_size,
            expires_at,
            rows,
        })
    }

    async fn submit(
        &self,
        scope: &RequestScope,
        request: &ReportRequest,
    ) -> Result<String, AdsError> {
        let response = self
            .client
            .post(scope, &request.endpoint(), &request.body())
            .await?;
        let report_id = match response.get("reportId") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(AdsError::Contract(
                    "report submission response has no reportId".into(),
                ))
            }
        };
        self.logger.info(
            "report submitted",
            Some(&serde_json::json!({
                "report_id": report_id,
                "state": JobState::Submitted,
                "endpoint": request.endpoint(),
            })),
        );
        Ok(report_id)
    }

    async fn poll_until_terminal(
        &self,
        scope: &RequestScope,
        report_id: &str,
    ) -> Result<(ReportStatus, usize), AdsError> {
        let path = format!("/v2/reports/{}", report_id);
        let max_attempts = self.poll.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let payload = with_rate_limit_backoff(
                self.poll.rate_limit_attempts,
                &self.logger,
                "report_status",
                || self.client.get(scope, &path, &[]),
            )
            .await?;
            let status = ReportStatus::from_payload(&payload)?;
            self.logger.debug(
                "report status",
                Some(&serde_json::json!({
                    "report_id": report_id,
                    "attempt": attempt,
                    "state": status.state(),
                })),
            );
            match status {
                ReportStatus::Success { .. } => return Ok((status, attempt)),
                ReportStatus::Failure { details } => {
                    self.logger.warn(
                        "report failed",
                        Some(&serde_json::json!({"report_id": report_id, "details": details})),
                    );
                    return Err(AdsError::ReportFailed {
                        report_id: report_id.to_string(),
                        details,
                    });
                }
                ReportStatus::InProgress if attempt < max_attempts => {
                    tokio::time::sleep(self.poll.interval).await;
                }
                ReportStatus::InProgress => {}
            }
        }
        self.logger.warn(
            "report polling exhausted",
            Some(&serde_json::json!({
                "report_id": report_id,
                "state": JobState::Timeout,
                "attempts": max_attempts,
            })),
        );
        Err(AdsError::ReportTimeout {
            report_id: report_id.to_string(),
            attempts: max_attempts,
        })
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
