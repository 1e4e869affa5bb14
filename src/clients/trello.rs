use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value as JsonValue;

use super::{execute, execute_read, join, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://api.trello.com/1";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://trello.com/1/authorize";

/// Trello REST client; every request carries the app key and user token as query params.
#[derive(Clone)]
pub struct TrelloClient {
    base: String,
    key: String,
    token: String,
    http: Client,
}

/// Browser URL a user opens to grant this app a token.
pub fn authorize_url(authorize_base: &str, key: &str, app_name: &str) -> String {
    format!(
        "{}?key={}&response_type=token&expiration=30days&scope=read,write&name={}",
        authorize_base,
        urlencoding::encode(key),
        urlencoding::encode(app_name)
    )
}

impl TrelloClient {
    pub fn new(base: impl Into<String>, key: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base: base.into(), key: key.into(), token: token.into(), http: make_http_client() }
    }

    fn req(&self, method: Method, path: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.http
            .request(method, join(&self.base, path))
            .query(&[("key", self.key.as_str()), ("token", self.token.as_str())])
            .query(query)
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)], action: &str) -> Result<String, ServletError> {
        let context = format!("failed to {action}");
        execute_read(|| self.req(Method::GET, path, query), &metric(action), &context, Accept::Success).await
    }

    /// POST/PUT with an optional JSON body.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&JsonValue>,
        action: &str,
    ) -> Result<String, ServletError> {
        let mut b = self.req(method, path, query);
        if let Some(body) = body {
            b = b.json(body);
        }
        execute(b, &metric(action), &format!("failed to {action}"), Accept::Success).await
    }

    pub async fn delete(&self, path: &str, action: &str) -> Result<String, ServletError> {
        let b = self.req(Method::DELETE, path, &[]);
        execute(b, &metric(action), &format!("failed to {action}"), Accept::Success).await
    }
}

fn metric(action: &str) -> String {
    format!("trello.{}", action.replace(' ', "_"))
}
