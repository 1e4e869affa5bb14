use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::{execute, execute_read, join, parse, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;
use crate::infra::runtime::token::{Token, TokenCache};

pub const DEFAULT_BASE: &str = "https://bsky.social";

/// Logged-in account; the access JWT has no advertised lifetime and is kept
/// until the server rejects it.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    pub did: String,
}

/// A record as returned by `com.atproto.repo.getRecord`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
    #[serde(default)]
    pub value: JsonValue,
}

#[derive(Debug, Deserialize)]
struct ResolvedHandle {
    did: String,
}

/// XRPC client for a PDS, authenticating with an app password.
#[derive(Clone)]
pub struct AtprotoClient {
    base: String,
    handle: String,
    password: String,
    session: TokenCache<Session>,
    http: Client,
}

fn is_expired(e: &ServletError) -> bool {
    match e {
        ServletError::Upstream { status: 401, .. } => true,
        ServletError::Upstream { body, .. } => body.contains("ExpiredToken"),
        _ => false,
    }
}

impl AtprotoClient {
    pub fn new(
        base: impl Into<String>,
        handle: impl Into<String>,
        password: impl Into<String>,
        session: TokenCache<Session>,
    ) -> Self {
        Self {
            base: base.into(),
            handle: handle.into(),
            password: password.into(),
            session,
            http: make_http_client(),
        }
    }

    fn xrpc(&self, method: Method, nsid: &str) -> RequestBuilder {
        self.http.request(method, join(&self.base, &format!("xrpc/{nsid}")))
    }

    async fn login(&self) -> Result<Token<Session>, ServletError> {
        let b = self
            .xrpc(Method::POST, "com.atproto.server.createSession")
            .json(&json!({ "identifier": self.handle, "password": self.password }));
        let body = execute(b, "bluesky.login", "failed to login", Accept::Success).await?;
        let session: Session = parse(&body, "failed to login")?;
        tracing::info!(did = %session.did, "bluesky session created");
        Ok(Token::new(session, None))
    }

    pub async fn session(&self) -> Result<Session, ServletError> {
        self.session.get_or_refresh(|| self.login()).await
    }

    /// Run an authenticated request; a rejected session is dropped and the
    /// request replayed once after a fresh login.
    async fn authed<F>(&self, make: F, tool: &str, context: &str, read: bool) -> Result<String, ServletError>
    where
        F: Fn(&Session) -> RequestBuilder,
    {
        let mut relogged = false;
        loop {
            let s = self.session().await?;
            let out = if read {
                execute_read(|| make(&s).bearer_auth(&s.access_jwt), tool, context, Accept::Success).await
            } else {
                execute(make(&s).bearer_auth(&s.access_jwt), tool, context, Accept::Success).await
            };
            match out {
                Err(e) if !relogged && is_expired(&e) => {
                    tracing::info!(tool, "bluesky session rejected, logging in again");
                    self.session.invalidate().await;
                    relogged = true;
                }
                other => return other,
            }
        }
    }

    pub async fn create_post(&self, record: &JsonValue) -> Result<String, ServletError> {
        self.authed(
            |s| {
                self.xrpc(Method::POST, "com.atproto.repo.createRecord").json(&json!({
                    "repo": s.did,
                    "collection": "app.bsky.feed.post",
                    "record": record,
                }))
            },
            "bluesky.create_record",
            "failed to post",
            false,
        )
        .await
    }

    pub async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordRef, ServletError> {
        let body = execute_read(
            || {
                self.xrpc(Method::GET, "com.atproto.repo.getRecord")
                    .query(&[("repo", repo), ("collection", collection), ("rkey", rkey)])
            },
            "bluesky.get_record",
            "failed to get record",
            Accept::Success,
        )
        .await?;
        parse(&body, "failed to get record")
    }

    /// DID for a handle, or `None` when the handle does not resolve.
    pub async fn resolve_handle(&self, handle: &str) -> Result<Option<String>, ServletError> {
        let out = execute_read(
            || self.xrpc(Method::GET, "com.atproto.identity.resolveHandle").query(&[("handle", handle)]),
            "bluesky.resolve_handle",
            "failed to resolve handle",
            Accept::Success,
        )
        .await;
        match out {
            Ok(body) => Ok(serde_json::from_str::<ResolvedHandle>(&body).ok().map(|r| r.did)),
            Err(ServletError::Upstream { status, .. }) if status < 500 => {
                tracing::debug!(handle, status, "handle did not resolve");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn search_posts(&self, query: &[(&str, String)]) -> Result<String, ServletError> {
        self.authed(
            |_| self.xrpc(Method::GET, "app.bsky.feed.searchPosts").query(query),
            "bluesky.search",
            "failed to search",
            true,
        )
        .await
    }

    pub async fn get_post_thread(&self, uri: &str, depth: i64, parent_height: i64) -> Result<String, ServletError> {
        let q = [
            ("uri", uri.to_string()),
            ("depth", depth.to_string()),
            ("parentHeight", parent_height.to_string()),
        ];
        self.authed(
            |_| self.xrpc(Method::GET, "app.bsky.feed.getPostThread").query(&q),
            "bluesky.get_thread",
            "failed to get thread",
            true,
        )
        .await
    }
}
