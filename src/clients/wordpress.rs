use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{execute, execute_read, join, parse, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;
use crate::infra::runtime::token::Token;

pub const DEFAULT_API_BASE: &str = "https://public-api.wordpress.com";
pub const DEFAULT_TOKEN_URL: &str = "https://public-api.wordpress.com/oauth2/token";

#[derive(Debug, Clone)]
pub enum Auth {
    /// Self-hosted sites: application password over HTTP Basic.
    Basic { username: String, password: String },
    /// WordPress.com: OAuth bearer token.
    Bearer(String),
}

/// Password-grant credentials for WordPress.com.
#[derive(Debug, Clone)]
pub struct PasswordGrant<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
struct OAuthResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Term {
    pub id: i64,
    pub name: String,
}

/// WordPress REST (`wp/v2`) client for one site.
#[derive(Clone)]
pub struct WordpressClient {
    base: String,
    auth: Auth,
    http: Client,
}

/// Reshape upstream failures into the `WordPress API error {status}: {body}` form.
fn wp_error(e: ServletError) -> ServletError {
    match e {
        ServletError::Upstream { status, body, .. } => {
            ServletError::Message(format!("WordPress API error {status}: {body}"))
        }
        other => other,
    }
}

/// Exchange account credentials for a WordPress.com token.
pub async fn fetch_token(token_url: &str, grant: &PasswordGrant<'_>) -> Result<Token<String>, ServletError> {
    let http = make_http_client();
    let b = http.post(token_url).form(&[
        ("client_id", grant.client_id),
        ("client_secret", grant.client_secret),
        ("grant_type", "password"),
        ("username", grant.username),
        ("password", grant.password),
    ]);
    let body = execute(b, "wordpress.oauth_token", "OAuth token request failed", Accept::Only(&[200])).await?;
    let resp: OAuthResponse = parse(&body, "failed to parse OAuth response")?;
    Ok(Token::new(resp.access_token, resp.expires_in))
}

impl WordpressClient {
    pub fn new(base: impl Into<String>, auth: Auth) -> Self {
        Self { base: base.into(), auth, http: make_http_client() }
    }

    fn req(&self, method: Method, path: &str) -> RequestBuilder {
        let b = self.http.request(method, join(&self.base, path));
        match &self.auth {
            Auth::Basic { username, password } => b.basic_auth(username, Some(password)),
            Auth::Bearer(token) => b.bearer_auth(token),
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, ServletError> {
        let tool = metric(&Method::GET, path);
        execute_read(|| self.req(Method::GET, path).query(query), &tool, "WordPress API error", Accept::Success)
            .await
            .map_err(wp_error)
    }

    pub async fn post(&self, path: &str, body: &JsonValue) -> Result<String, ServletError> {
        let b = self.req(Method::POST, path).json(body);
        execute(b, &metric(&Method::POST, path), "WordPress API error", Accept::Success)
            .await
            .map_err(wp_error)
    }

    pub async fn delete(&self, path: &str, force: bool) -> Result<String, ServletError> {
        let mut b = self.req(Method::DELETE, path);
        if force {
            b = b.query(&[("force", "true")]);
        }
        execute(b, &metric(&Method::DELETE, path), "WordPress API error", Accept::Success)
            .await
            .map_err(wp_error)
    }

    /// Terms of a taxonomy (`categories` or `tags`) matching `search`.
    pub async fn search_terms(&self, taxonomy: &str, search: &str) -> Result<Vec<Term>, ServletError> {
        let body = self
            .get(taxonomy, &[("per_page", "100".into()), ("search", search.to_string())])
            .await?;
        parse(&body, "failed to parse terms")
    }

    pub async fn create_term(&self, taxonomy: &str, body: &JsonValue) -> Result<Term, ServletError> {
        let out = self.post(taxonomy, body).await?;
        parse(&out, "failed to parse new term")
    }
}

/// `wordpress.{method}.{first path segment}` so ids stay out of metric names.
fn metric(method: &Method, path: &str) -> String {
    let resource = path.trim_start_matches('/').split(['/', '?']).next().unwrap_or_default();
    format!("wordpress.{}.{}", method.as_str().to_ascii_lowercase(), resource)
}
