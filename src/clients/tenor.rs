use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use super::{check_status, execute_read, join, parse, send, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://tenor.googleapis.com/v2";
pub const CLIENT_KEY: &str = "mcp-servlets";
pub const RATE_LIMITED: &str = "rate limit exceeded - please configure your own API key";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<GifResult>,
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Deserialize)]
pub struct GifResult {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_description: String,
    #[serde(default)]
    pub itemurl: String,
    #[serde(default)]
    pub media_formats: HashMap<String, MediaItem>,
}

#[derive(Debug, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(default)]
    pub dims: Vec<u32>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Clone)]
pub struct TenorClient {
    base: String,
    api_key: String,
    http: Client,
}

impl TenorClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base: base.into(), api_key: api_key.into(), http: make_http_client() }
    }

    pub async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse, ServletError> {
        let url = join(&self.base, "search");
        let limit = limit.to_string();
        let out = execute_read(
            || {
                self.http.get(&url).query(&[
                    ("q", query),
                    ("key", self.api_key.as_str()),
                    ("client_key", CLIENT_KEY),
                    ("limit", limit.as_str()),
                    ("media_filter", "tinygif,gif"),
                ])
            },
            "tenor.search",
            "Tenor API error",
            Accept::Only(&[200]),
        )
        .await;
        match out {
            Ok(body) => parse(&body, "failed to parse Tenor response"),
            Err(ServletError::Upstream { status: 429, .. }) => Err(ServletError::Message(RATE_LIMITED.into())),
            Err(e) => Err(e),
        }
    }

    /// Download one media file.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, ServletError> {
        let resp = send(self.http.get(url), "tenor.media").await?;
        let resp = check_status(resp, "tenor.media", "failed to fetch GIF", Accept::Only(&[200])).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}
