//! Tenor GIF search.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use super::schema;
use crate::clients::tenor::{TenorClient, DEFAULT_BASE};
use crate::core::{Args, CallResult, Content, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

const MAX_RESULTS: i64 = 3;

pub struct TenorServlet {
    config: ServletConfig,
}

impl TenorServlet {
    pub const NAME: &'static str = "tenor";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Servlet for TenorServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![ToolDescription::new(
            "gif-search",
            "Search for GIFs on Tenor",
            schema(
                json!({
                    "query": { "type": "string", "description": "Search query for GIFs" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_RESULTS, "default": 1 }
                }),
                &["query"],
            ),
        )]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        if tool != "gif-search" {
            return Err(ServletError::UnknownTool(tool.to_string()));
        }
        let query = args.require_str("query")?;
        let limit = args.i64_or("limit", 1)?.clamp(1, MAX_RESULTS) as u32;
        let client = TenorClient::new(self.config.base_url("base-url", DEFAULT_BASE), self.config.require("api-key")?);
        let found = client.search(&query, limit).await?;

        let mut content = vec![Content::text(format!("Search results for \"{query}\" (Powered by Tenor):"))];
        for gif in found.results {
            let Some(media) = gif.media_formats.get("tinygif") else {
                continue;
            };
            let bytes = match client.fetch(&media.url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(id = %gif.id, error = %e, "skipping GIF that failed to download");
                    continue;
                }
            };
            if !gif.title.trim().is_empty() {
                content.push(Content::text(gif.title.clone()));
            }
            content.push(Content::image(STANDARD.encode(&bytes), "image/gif"));
            content.push(Content::text(gif.content_description));
            content.push(Content::text(gif.itemurl));
        }
        Ok(CallResult::with(content))
    }
}
