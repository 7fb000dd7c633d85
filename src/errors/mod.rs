mod ads_error;
mod mcp_error;
mod tool_error;

pub use ads_error::{AdsError, AdsErrorKind};
pub use mcp_error::{ErrorCode, McpError};
pub use tool_error::{ToolError, ToolErrorKind};
