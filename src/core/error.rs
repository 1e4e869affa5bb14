use thiserror::Error;

/// Servlet-wide error model. Every variant ends up as the text of an
/// error-flagged call result, so the display strings are user facing.
#[derive(Debug, Error)]
pub enum ServletError {
    #[error("missing required argument: {0}")]
    MissingArgument(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("missing configuration: {0}")]
    NotConfigured(String),
    #[error("Unknown tool {0}")]
    UnknownTool(String),
    #[error("{context}: {status} {body}")]
    Upstream {
        context: String,
        status: u16,
        body: String,
    },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    Message(String),
}

impl ServletError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServletError::InvalidArgument(msg.into())
    }

    pub fn upstream(context: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        ServletError::Upstream {
            context: context.into(),
            status,
            body: body.into(),
        }
    }

    /// Upstream HTTP status, when the failure came from the remote API.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServletError::Upstream { status, .. } => Some(*status),
            ServletError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ServletError {
    fn from(e: serde_json::Error) -> Self {
        ServletError::Decode(format!("invalid JSON: {e}"))
    }
}

impl From<anyhow::Error> for ServletError {
    fn from(e: anyhow::Error) -> Self {
        ServletError::Message(e.to_string())
    }
}
