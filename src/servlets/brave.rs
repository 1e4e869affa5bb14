//! Brave web and image search.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::schema;
use crate::clients::brave::{BraveClient, DEFAULT_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

const WEB_STRINGS: &[&str] = &[
    "country", "search_lang", "ui_lang", "safesearch", "freshness", "result_filter", "goggles_id", "units",
];
const WEB_BOOLS: &[&str] = &["text_decorations", "spellcheck", "summary"];
const IMAGE_STRINGS: &[&str] = &["country", "search_lang", "safesearch"];

pub struct BraveServlet {
    config: ServletConfig,
}

impl BraveServlet {
    pub const NAME: &'static str = "brave-search";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }
}

/// `q` plus the listed optional params, in a stable order.
fn query(
    args: &Args,
    strings: &[&'static str],
    ints: &[&'static str],
    bools: &[&'static str],
) -> Result<Vec<(&'static str, String)>, ServletError> {
    let mut q = vec![("q", args.require_str("q")?)];
    for key in strings {
        if let Some(v) = args.str(key) {
            q.push((*key, v));
        }
    }
    for key in ints {
        if let Some(v) = args.i64(key)? {
            q.push((*key, v.to_string()));
        }
    }
    for key in bools {
        if let Some(v) = args.bool(key)? {
            q.push((*key, v.to_string()));
        }
    }
    Ok(q)
}

fn common_props() -> JsonValue {
    json!({
        "q": { "type": "string", "description": "Search query, at most 400 characters" },
        "country": { "type": "string", "description": "2 letter country code, e.g. US" },
        "search_lang": { "type": "string", "description": "Language of results, e.g. en" },
        "safesearch": { "type": "string", "enum": ["off", "moderate", "strict"] },
        "spellcheck": { "type": "boolean" }
    })
}

#[async_trait]
impl Servlet for BraveServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        let mut web = common_props();
        if let (Some(p), JsonValue::Object(extra)) = (
            web.as_object_mut(),
            json!({
                "ui_lang": { "type": "string", "description": "UI locale, e.g. en-US" },
                "count": { "type": "integer", "maximum": 20, "default": 20 },
                "offset": { "type": "integer", "maximum": 9 },
                "freshness": { "type": "string", "description": "pd, pw, pm, py or YYYY-MM-DDtoYYYY-MM-DD" },
                "text_decorations": { "type": "boolean" },
                "result_filter": { "type": "string", "description": "Comma separated result types, e.g. web,news" },
                "goggles_id": { "type": "string" },
                "units": { "type": "string", "enum": ["metric", "imperial"] },
                "extra_snippets": { "type": "boolean", "default": true },
                "summary": { "type": "boolean" }
            }),
        ) {
            p.extend(extra);
        }
        let mut images = common_props();
        if let Some(p) = images.as_object_mut() {
            p.insert("count".into(), json!({ "type": "integer", "maximum": 100, "default": 50 }));
        }
        vec![
            ToolDescription::new("brave-web-search", "Search the web with Brave Search", schema(web, &["q"])),
            ToolDescription::new("brave-image-search", "Search images with Brave Search", schema(images, &["q"])),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let (kind, q) = match tool {
            "brave-web-search" => {
                let mut q = query(args, WEB_STRINGS, &["count", "offset"], WEB_BOOLS)?;
                q.push(("extra_snippets", args.bool_or("extra_snippets", true)?.to_string()));
                ("web", q)
            }
            "brave-image-search" => ("images", query(args, IMAGE_STRINGS, &["count"], &["spellcheck"])?),
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        let client = BraveClient::new(self.config.base_url("base-url", DEFAULT_BASE), self.config.require("api-key")?);
        Ok(CallResult::text(client.search(kind, &q).await?))
    }
}
