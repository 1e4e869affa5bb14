use reqwest::header::ACCEPT;
use reqwest::Client;

use super::{execute_read, join, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://api.search.brave.com/res/v1";

#[derive(Clone)]
pub struct BraveClient {
    base: String,
    api_key: String,
    http: Client,
}

impl BraveClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base: base.into(), api_key: api_key.into(), http: make_http_client() }
    }

    /// GET `{base}/{kind}/search` with the given query.
    pub async fn search(&self, kind: &str, query: &[(&str, String)]) -> Result<String, ServletError> {
        let url = join(&self.base, &format!("{kind}/search"));
        execute_read(
            || {
                self.http
                    .get(&url)
                    .header("X-Subscription-Token", &self.api_key)
                    .header(ACCEPT, "application/json")
                    .query(query)
            },
            &format!("brave-search.{kind}"),
            &format!("Failed to run {kind} search"),
            Accept::Success,
        )
        .await
    }
}
