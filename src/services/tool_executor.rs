use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::constants::limits::RESULT_MAX_STRING;
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::redact::redact_object;
use crate::utils::suggest::suggest;

use serde_json::Value;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.handlers.contains_key(tool)
    }

    fn wrap_result(&self, tool: &str, result: &Value, trace_id: String, started: Instant) -> Value {
        serde_json::json!({
            "success": true,
            "tool": tool,
            "result": redact_object(result, RESULT_MAX_STRING, None),
            "duration_ms": started.elapsed().as_millis() as u64,
            "trace_id": trace_id,
        })
    }

    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let started = Instant::now();
        let Some(handler) = self.handlers.get(tool) else {
            let suggestions = suggest(tool, &self.tool_names(), 3);
            let hint = if suggestions.is_empty() {
                "Call tools/list to see available tools".to_string()
            } else {
                format!("Did you mean: {}", suggestions.join(", "))
            };
            return Err(
                ToolError::invalid_params(format!("Unknown tool: {}", tool)).with_hint(hint)
            );
        };
        let trace_id = uuid::Uuid::new_v4().to_string();
        self.logger.debug(
            "tool call",
            Some(&serde_json::json!({"tool": tool, "trace_id": trace_id, "args": args})),
        );

        match handler.handle(args).await {
            Ok(result) => {
                self.logger.info(
                    "tool call completed",
                    Some(&serde_json::json!({
                        "tool": tool,
                        "trace_id": trace_id,
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                Ok(self.wrap_result(tool, &result, trace_id, started))
            }
            Err(err) => {
                self.logger.warn(
                    "tool call failed",
                    Some(&serde_json::json!({
                        "tool": tool,
                        "trace_id": trace_id,
                        "code": err.code,
                        "message": err.message,
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolErrorKind;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn handle(&self, args: Value) -> Result<Value, ToolError> {
            Ok(serde_json::json!({"args": args, "access_token": "Atza|leaky"}))
        }
    }

    fn executor() -> ToolExecutor {
        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("get_profiles".to_string(), Arc::new(Echo));
        ToolExecutor::new(Logger::new("test"), handlers)
    }

    #[tokio::test]
    async fn envelope_wraps_redacted_result() {
        let envelope = executor()
            .execute("get_profiles", serde_json::json!({"x": 1}))
            .await
            .expect("envelope");
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["tool"], "get_profiles");
        assert_eq!(envelope["result"]["args"]["x"], 1);
        assert_eq!(envelope["result"]["access_token"], "[REDACTED]");
        assert!(envelope["trace_id"].as_str().is_some());
        assert!(envelope["duration_ms"].as_u64().is_some());
    }

    #[tokio::test]
    async fn unknown_tool_suggests_close_names() {
        let err = executor()
            .execute("get_profile", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
        assert!(err.hint.unwrap_or_default().contains("get_profiles"));
    }
}
