//! MCP server integration (Streamable HTTP + stdio) for mcp-servlets.
//!
//! - Tools come from the servlet registry, so the handler lists and routes
//!   them by hand instead of through a macro-generated router.
//! - Servlet failures are returned as `isError` results; only unknown tools
//!   and malformed arguments become protocol errors.

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler,
};
use serde_json::Value as JsonValue;

use crate::core::error::ServletError;
use crate::servlets::Registry;

#[derive(Clone)]
pub struct ServletsSvc {
    registry: Registry,
}

impl ServletsSvc {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tools(&self) -> Vec<rmcp::model::Tool> {
        self.registry
            .list()
            .iter()
            .map(|t| t.to_rmcp(&t.name))
            .collect()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<rmcp::model::JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let args = arguments.map(JsonValue::Object).unwrap_or(JsonValue::Null);
        match self.registry.call(name, &args).await {
            Ok(result) => Ok(result.into()),
            Err(e @ ServletError::UnknownTool(_)) | Err(e @ ServletError::InvalidArgument(_)) => {
                Err(McpError::invalid_params(e.to_string(), None))
            }
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }
}

impl ServerHandler for ServletsSvc {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tools wrapping third-party web APIs. Each tool reads its API credentials from server configuration."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = %request.name, "call_tool invoked");
        self.dispatch(&request.name, request.arguments).await
    }
}
