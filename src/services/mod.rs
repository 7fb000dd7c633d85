pub mod ads_client;
pub mod credentials;
pub mod logger;
pub mod metrics;
pub mod reports;
pub mod retry;
pub mod settings;
pub mod tool_executor;
pub mod validation;
