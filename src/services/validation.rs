use crate::constants::paging;
use crate::errors::ToolError;
use crate::services::reports::{CampaignType, ReportType, TimeUnit};
use crate::utils::dates::is_valid_compact;
use serde_json::Value;

/// Argument coercion shared by the tool handlers. Schema validation has
/// already run; these checks cover what JSON Schema cannot express.
#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &Value, label: &str) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(normalized.to_string())
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => self.ensure_string(val, label).map(Some),
        }
    }

    /// Entity ids arrive as JSON numbers or strings; both are accepted.
    pub fn ensure_optional_id(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(val) => self.ensure_string(val, label).map(Some),
        }
    }

    pub fn ensure_id_list(&self, value: Option<&Value>, label: &str) -> Result<Vec<String>, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| ToolError::invalid_params(format!("{} must be an array", label)))?;
        items
            .iter()
            .map(|item| {
                self.ensure_optional_id(Some(item), label)?.ok_or_else(|| {
                    ToolError::invalid_params(format!("{} must not contain null", label))
                })
            })
            .collect()
    }

    pub fn ensure_string_list(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<Vec<String>>, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| ToolError::invalid_params(format!("{} must be an array", label)))?;
        if items.is_empty() {
            return Err(ToolError::invalid_params(format!("{} must not be empty", label)));
        }
        items
            .iter()
            .map(|item| self.ensure_string(item, label))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn ensure_start_index(&self, value: Option<&Value>) -> Result<u64, ToolError> {
        match value.filter(|v| !v.is_null()) {
            None => Ok(0),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| ToolError::invalid_params("start_index must be a non-negative integer")),
        }
    }

    pub fn ensure_count(&self, value: Option<&Value>) -> Result<u64, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(paging::DEFAULT_COUNT);
        };
        match value.as_u64() {
            Some(count) if (1..=paging::MAX_COUNT).contains(&count) => Ok(count),
            _ => Err(ToolError::invalid_params(format!(
                "count must be an integer between 1 and {}",
                paging::MAX_COUNT
            ))),
        }
    }

    pub fn ensure_campaign_type(&self, value: Option<&Value>) -> Result<CampaignType, ToolError> {
        match self.ensure_optional_string(value, "campaign_type")? {
            None => Ok(CampaignType::SponsoredProducts),
            Some(raw) => CampaignType::parse(&raw).ok_or_else(|| {
                ToolError::invalid_params(format!(
                    "campaign_type must be one of sp, sb, sd (got {})",
                    raw
                ))
            }),
        }
    }

    pub fn ensure_report_type(&self, value: Option<&Value>) -> Result<ReportType, ToolError> {
        let raw = self.ensure_string(value.unwrap_or(&Value::Null), "report_type")?;
        ReportType::parse(&raw).ok_or_else(|| {
            ToolError::invalid_params(format!(
                "report_type must be one of campaigns, adGroups, keywords, productAds (got {})",
                raw
            ))
        })
    }

    pub fn ensure_time_unit(&self, value: Option<&Value>) -> Result<Option<TimeUnit>, ToolError> {
        match self.ensure_optional_string(value, "time_unit")? {
            None => Ok(None),
            Some(raw) => TimeUnit::parse(&raw).map(Some).ok_or_else(|| {
                ToolError::invalid_params(format!("time_unit must be SUMMARY or DAILY (got {})", raw))
            }),
        }
    }

    pub fn ensure_optional_date(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ToolError> {
        let Some(date) = self.ensure_optional_string(value, label)? else {
            return Ok(None);
        };
        if !is_valid_compact(&date) {
            return Err(ToolError::invalid_params(format!(
                "{} must be a valid date in YYYYMMDD format (got {})",
                label, date
            )));
        }
        Ok(Some(date))
    }
}
