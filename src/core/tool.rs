use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::args::Args;
use crate::core::content::CallResult;
use crate::core::error::ServletError;

/// Static description of one callable tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

impl ToolDescription {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: JsonValue) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names listed under the schema's `required` key.
    pub fn required(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn to_rmcp(&self, name: &str) -> rmcp::model::Tool {
        let schema = match &self.input_schema {
            JsonValue::Object(m) => m.clone(),
            _ => serde_json::Map::new(),
        };
        rmcp::model::Tool::new(name.to_string(), self.description.clone(), Arc::new(schema))
    }
}

/// A servlet wraps one upstream API behind a describe/call surface.
#[async_trait]
pub trait Servlet: Send + Sync {
    fn name(&self) -> &'static str;
    fn describe(&self) -> Vec<ToolDescription>;
    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError>;
}
