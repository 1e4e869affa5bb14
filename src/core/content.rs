//! Uniform call result envelope returned by every tool.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One item of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        /// Base64 encoded bytes.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Content::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self::with(vec![Content::text(text)])
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }

    /// Pretty-printed JSON as a single text item.
    pub fn json(value: &JsonValue) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    pub fn with(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Text of the first text item, handy for callers that only expect one.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(Content::as_text)
    }
}

impl From<CallResult> for rmcp::model::CallToolResult {
    fn from(r: CallResult) -> Self {
        let items: Vec<rmcp::model::Content> = r
            .content
            .into_iter()
            .map(|c| match c {
                Content::Text { text } => rmcp::model::Content::text(text),
                Content::Image { data, mime_type } => rmcp::model::Content::image(data, mime_type),
                Content::Resource { resource } => {
                    let body = resource.text.or(resource.blob).unwrap_or_default();
                    rmcp::model::Content::embedded_text(resource.uri, body)
                }
            })
            .collect();
        if r.is_error {
            rmcp::model::CallToolResult::error(items)
        } else {
            rmcp::model::CallToolResult::success(items)
        }
    }
}
