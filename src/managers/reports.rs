use crate::constants::reports::DEFAULT_RANGE_DAYS;
use crate::errors::ToolError;
use crate::services::credentials::CredentialResolver;
use crate::services::logger::Logger;
use crate::services::reports::{ReportRequest, ReportWorkflow};
use crate::services::validation::Validation;
use crate::utils::dates::default_range;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;

/// `get_reports`: runs one report job end to end and returns normalized
/// rows with a summary.
pub struct ReportsManager {
    logger: Logger,
    validation: Validation,
    credentials: Arc<CredentialResolver>,
    workflow: ReportWorkflow,
}

impl ReportsManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        credentials: Arc<CredentialResolver>,
        workflow: ReportWorkflow,
    ) -> Self {
        Self {
            logger: logger.child("get_reports"),
            validation,
            credentials,
            workflow,
        }
    }

    /// Builds the report request from tool arguments. Missing dates default
    /// to the trailing window ending yesterday relative to `today`.
    pub fn build_request(&self, args: &Value, today: NaiveDate) -> Result<ReportRequest, ToolError> {
        let v = &self.validation;
        let report_type = v.ensure_report_type(args.get("report_type"))?;
        let campaign_type = v.ensure_campaign_type(args.get("campaign_type"))?;
        let (default_start, default_end) = default_range(today, DEFAULT_RANGE_DAYS);
        let start_date = v
            .ensure_optional_date(args.get("start_date"), "start_date")?
            .unwrap_or(default_start);
        let end_date = v
            .ensure_optional_date(args.get("end_date"), "end_date")?
            .unwrap_or(default_end);

        let mut request = ReportRequest::new(report_type, campaign_type, start_date, end_date);
        request.metrics = v.ensure_string_list(args.get("metrics"), "metrics")?;
        request.time_unit = v.ensure_time_unit(args.get("time_unit"))?;
        request.state_filter = v.ensure_optional_string(args.get("state_filter"), "state_filter")?;
        request.campaign_ids = v.ensure_id_list(args.get("campaign_ids"), "campaign_ids")?;
        request.validate()?;
        Ok(request)
    }

    pub async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let today = chrono::Utc::now().date_naive();
        let request = self.build_request(&args, today)?;
        let scope = self.credentials.resolve(&args).await?;

        let outcome = self.workflow.run(&scope, &request).await?;
        let (rows, summary) = outcome.normalize(request.report_type);
        self.logger.info(
            "report normalized",
            Some(&serde_json::json!({
                "report_id": outcome.report_id,
                "rows": rows.len(),
                "polls": outcome.polls,
            })),
        );

        Ok(serde_json::json!({
            "report_id": outcome.report_id,
            "report_type": request.report_type,
            "campaign_type": request.campaign_type,
            "start_date": request.start_date,
            "end_date": request.end_date,
            "time_unit": request.time_unit,
            "row_count": rows.len(),
            "rows": rows,
            "summary": summary,
            "polls": outcome.polls,
        }))
    }
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for ReportsManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle", args.get("report_type"));
        self.run(args).await
    }
}
