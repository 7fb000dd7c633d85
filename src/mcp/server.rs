use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::catalog::{tool_catalog, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::services::logger::Logger;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn map_tool_error(tool: &str, error: &ToolError) -> McpError {
    let kind = serde_json::to_value(error.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let mut lines = vec![
        "AdsToolError".to_string(),
        format!("tool: {}", tool),
        format!("kind: {}", kind),
        format!("code: {}", error.code),
        format!("retryable: {}", error.retryable),
        format!("message: {}", error.message),
    ];
    if let Some(hint) = &error.hint {
        lines.push(format!("hint: {}", hint));
    }
    if let Some(status) = error.http_status() {
        lines.push(format!("http_status: {}", status));
    }

    let code = match error.kind {
        ToolErrorKind::InvalidParams => ErrorCode::InvalidParams,
        ToolErrorKind::Timeout => ErrorCode::RequestTimeout,
        ToolErrorKind::Upstream => ErrorCode::UpstreamError,
        ToolErrorKind::Internal => ErrorCode::InternalError,
    };
    McpError::new(code, lines.join("\n")).with_data(serde_json::json!({
        "tool": tool,
        "kind": kind,
        "code": error.code,
        "retryable": error.retryable,
        "http_status": error.http_status(),
    }))
}

pub struct McpServer {
    app: Arc<App>,
    logger: Logger,
}

impl McpServer {
    pub fn new(app: Arc<App>) -> Self {
        let logger = app.logger.child("server");
        Self { app, logger }
    }

    pub fn from_env() -> Result<Self, ToolError> {
        let app = App::initialize()?;
        Ok(Self::new(Arc::new(app)))
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": tool_catalog() })
    }

    async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        validate_tool_args(name, &args)?;
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };

        let envelope = self
            .app
            .tool_executor
            .execute(name, args)
            .await
            .map_err(|err| map_tool_error(name, &err))?;

        Ok(serde_json::json!({
            "content": [ { "type": "text", "text": serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string()) } ]
        }))
    }

    /// Handles one line of input. Returns `None` for notifications and blank
    /// lines, which get no reply.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parsed: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(err) => {
                self.logger.warn(
                    "unparsable request line",
                    Some(&serde_json::json!({"error": err.to_string()})),
                );
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    McpError::from_code(ErrorCode::ParseError),
                ));
            }
        };
        let fallback_id = parsed.get("id").cloned().unwrap_or(Value::Null);
        let request = match serde_json::from_value::<JsonRpcRequest>(parsed) {
            Ok(req) if req.has_valid_version() => req,
            _ => {
                return Some(JsonRpcResponse::failure(
                    fallback_id,
                    McpError::from_code(ErrorCode::InvalidRequest),
                ))
            }
        };

        let id = match request.id.clone() {
            Some(id) => id,
            None => {
                self.logger
                    .debug("notification", Some(&Value::String(request.method.clone())));
                return None;
            }
        };

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.handle_initialize()),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            method if method.starts_with("notifications/") => {
                JsonRpcResponse::success(id, serde_json::json!({}))
            }
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list()),
            "tools/call" => match request.tool_call() {
                None => JsonRpcResponse::failure(
                    id,
                    McpError::new(ErrorCode::InvalidParams, "Missing tool name"),
                ),
                Some(call) => match self.handle_tools_call(&call.name, call.arguments).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::failure(id, err),
                },
            },
            _ => JsonRpcResponse::failure(id, McpError::from_code(ErrorCode::MethodNotFound)),
        };
        Some(response)
    }

    /// Serves newline-delimited JSON-RPC until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            if let Some(response) = self.handle_line(&line).await {
                let payload = serde_json::to_string(&response).unwrap_or_default();
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        self.logger.info(
            "server ready",
            Some(&serde_json::json!({"version": SERVER_VERSION, "tools": tool_catalog().len()})),
        );
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let server = McpServer::from_env()?;
    server.run_stdio().await
}
