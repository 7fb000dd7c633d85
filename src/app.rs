use crate::errors::ToolError;
use crate::managers::entities::{EntityKind, EntityManager};
use crate::managers::health::HealthManager;
use crate::managers::profiles::ProfilesManager;
use crate::managers::reports::ReportsManager;
use crate::mcp::catalog::tool_catalog;
use crate::services::ads_client::AdsClient;
use crate::services::credentials::CredentialResolver;
use crate::services::logger::Logger;
use crate::services::reports::{PollConfig, ReportWorkflow};
use crate::services::retry::BackoffPolicy;
use crate::services::settings::Settings;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::validation::Validation;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub settings: Settings,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must have a registered handler.")
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("ads-mcp");
        let settings = Settings::from_env(&logger)?;
        Self::with_settings(logger, settings)
    }

    pub fn with_settings(logger: Logger, settings: Settings) -> Result<Self, ToolError> {
        let validation = Validation::new();
        let client = AdsClient::new(logger.clone(), &settings)?;
        let credentials = Arc::new(CredentialResolver::new(logger.clone(), &settings)?);
        let policy = BackoffPolicy::default().with_max_attempts(settings.retry_max_attempts);

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(
            "get_profiles".to_string(),
            Arc::new(ProfilesManager::new(
                logger.clone(),
                validation.clone(),
                credentials.clone(),
                client.clone(),
                policy.clone(),
            )),
        );
        for kind in [
            EntityKind::Campaigns,
            EntityKind::AdGroups,
            EntityKind::Keywords,
            EntityKind::ProductAds,
        ] {
            handlers.insert(
                kind.tool_name().to_string(),
                Arc::new(EntityManager::new(
                    kind,
                    logger.clone(),
                    validation.clone(),
                    credentials.clone(),
                    client.clone(),
                    policy.clone(),
                )),
            );
        }
        handlers.insert(
            "get_reports".to_string(),
            Arc::new(ReportsManager::new(
                logger.clone(),
                validation.clone(),
                credentials.clone(),
                ReportWorkflow::new(
                    client.clone(),
                    logger.clone(),
                    PollConfig::from_settings(&settings),
                ),
            )),
        );
        handlers.insert(
            "healthcheck".to_string(),
            Arc::new(HealthManager::new(
                logger.child("health"),
                settings.clone(),
                credentials,
                client,
            )),
        );

        Self::validate_tool_wiring(&handlers)?;
        logger.debug("settings", Some(&settings.summary()));

        Ok(Self {
            tool_executor: Arc::new(ToolExecutor::new(logger.clone(), handlers)),
            logger,
            settings,
        })
    }
}
