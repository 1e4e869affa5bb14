use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;

use super::{execute, execute_read, join, parse, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;
use crate::infra::runtime::token::{Token, TokenCache};

pub const DEFAULT_BASE: &str = "https://test.api.amadeus.com";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Amadeus self-service client using the client-credentials grant.
#[derive(Clone)]
pub struct AmadeusClient {
    base: String,
    api_key: String,
    api_secret: String,
    token: TokenCache<String>,
    http: Client,
}

impl AmadeusClient {
    pub fn new(
        base: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        token: TokenCache<String>,
    ) -> Self {
        Self {
            base: base.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token,
            http: make_http_client(),
        }
    }

    async fn fetch_token(&self) -> Result<Token<String>, ServletError> {
        let b = self.http.post(join(&self.base, "v1/security/oauth2/token")).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.api_key.as_str()),
            ("client_secret", self.api_secret.as_str()),
        ]);
        let body = execute(b, "amadeus.token", "error while fetching access token", Accept::Only(&[200])).await?;
        let t: TokenResponse = parse(&body, "error while fetching access token")?;
        tracing::debug!(expires_in = ?t.expires_in, "amadeus token issued");
        Ok(Token::new(t.access_token, t.expires_in))
    }

    /// Authenticated GET; `action` completes the `error while {action}` failure text.
    pub async fn get(&self, path: &str, query: &[(&str, String)], action: &str) -> Result<String, ServletError> {
        let token = self.token.get_or_refresh(|| self.fetch_token()).await?;
        let url = join(&self.base, path);
        let tool = format!("amadeus.{}", path.trim_start_matches('/').replace('/', "."));
        let out = execute_read(
            || self.http.get(&url).bearer_auth(&token).header(ACCEPT, "application/json").query(query),
            &tool,
            &format!("error while {action}"),
            Accept::Only(&[200]),
        )
        .await;
        if matches!(out, Err(ServletError::Upstream { status: 401, .. })) {
            self.token.invalidate().await;
        }
        out
    }
}
