use std::fmt;

use crate::core::error::ServletError;

const WEB_PREFIX: &str = "https://bsky.app/profile/";

/// `at://{repo}/{collection}/{rkey}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Accepts an AT URI or a bsky.app web link to a post, list or feed.
    pub fn parse(uri: &str) -> Result<Self, ServletError> {
        let uri = uri.trim();
        if let Some(rest) = uri.strip_prefix("at://") {
            return match segments(rest).as_slice() {
                [repo, collection, rkey, ..] => Ok(Self::from_parts(repo, collection, rkey)),
                _ => Err(ServletError::invalid(format!("invalid at:// URI format: {uri}"))),
            };
        }
        if let Some(rest) = uri.strip_prefix(WEB_PREFIX) {
            return match segments(rest).as_slice() {
                [repo, kind, rkey, ..] => {
                    let collection = match *kind {
                        "post" => "app.bsky.feed.post",
                        "lists" => "app.bsky.graph.list",
                        "feed" => "app.bsky.feed.generator",
                        other => {
                            return Err(ServletError::invalid(format!(
                                "unsupported bsky.app link type '{other}': {uri}"
                            )))
                        }
                    };
                    Ok(Self::from_parts(repo, collection, rkey))
                }
                _ => Err(ServletError::invalid(format!("invalid bsky.app URI format: {uri}"))),
            };
        }
        Err(ServletError::invalid(format!("unhandled URI format: {uri}")))
    }

    fn from_parts(repo: &str, collection: &str, rkey: &str) -> Self {
        Self { repo: repo.into(), collection: collection.into(), rkey: rkey.into() }
    }
}

/// Non-empty path segments, ignoring any query or fragment.
fn segments(rest: &str) -> Vec<&str> {
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}
