//! Bluesky posting, replies, search and threads over the AT Protocol.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};

use super::schema;
use crate::clients::atproto::{AtprotoClient, Session, DEFAULT_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;
use crate::infra::runtime::token::TokenCache;

pub mod facets;
pub mod uri;

use uri::AtUri;

pub struct BlueskyServlet {
    config: ServletConfig,
    session: TokenCache<Session>,
}

impl BlueskyServlet {
    pub const NAME: &'static str = "bluesky";

    pub fn new(config: ServletConfig) -> Self {
        Self { config, session: TokenCache::new() }
    }

    fn client(&self) -> Result<AtprotoClient, ServletError> {
        Ok(AtprotoClient::new(
            self.config.base_url("base-url", DEFAULT_BASE),
            self.config.require("handle")?,
            self.config.require("app-password")?,
            self.session.clone(),
        ))
    }

    async fn post(&self, client: &AtprotoClient, text: &str, reply: Option<JsonValue>) -> Result<String, ServletError> {
        let facets = facets::parse_facets(text, client).await?;
        let mut record = json!({
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        if !facets.is_empty() {
            record["facets"] = serde_json::to_value(&facets)?;
        }
        if let Some(reply) = reply {
            record["reply"] = reply;
        }
        client.create_post(&record).await
    }
}

/// `{root, parent}` strong refs for a reply to `parent`.
async fn reply_refs(client: &AtprotoClient, parent: &AtUri) -> Result<JsonValue, ServletError> {
    let parent = client.get_record(&parent.repo, &parent.collection, &parent.rkey).await?;
    let root_uri = parent
        .value
        .pointer("/reply/root/uri")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    let (root_uri, root_cid) = match root_uri {
        Some(u) => {
            let at = AtUri::parse(u)?;
            let root = client.get_record(&at.repo, &at.collection, &at.rkey).await?;
            (root.uri, root.cid)
        }
        None => (parent.uri.clone(), parent.cid.clone()),
    };
    Ok(json!({
        "root": { "uri": root_uri, "cid": root_cid },
        "parent": { "uri": parent.uri, "cid": parent.cid },
    }))
}

/// `{n}{s|m|h|d}`, e.g. `5m` or `2h`.
pub fn parse_within(within: &str) -> Result<Duration, ServletError> {
    let invalid = || ServletError::invalid(format!("invalid duration: {within}"));
    let w = within.trim();
    let unit = w.chars().last().ok_or_else(invalid)?;
    let n: i64 = w[..w.len() - unit.len_utf8()].parse().map_err(|_| invalid())?;
    if n < 0 {
        return Err(invalid());
    }
    let window = match unit {
        's' => Duration::try_seconds(n),
        'm' => Duration::try_minutes(n),
        'h' => Duration::try_hours(n),
        'd' => Duration::try_days(n),
        _ => None,
    };
    window.ok_or_else(invalid)
}

/// Start of the `within` window ending now.
fn window_start(within: &str) -> Result<DateTime<Utc>, ServletError> {
    Utc::now()
        .checked_sub_signed(parse_within(within)?)
        .ok_or_else(|| ServletError::invalid(format!("invalid duration: {within}")))
}

const SEARCH_KEYS: &[&str] = &["sort", "since", "until", "mentions", "author", "lang", "domain", "url", "cursor"];

fn search_query(args: &Args) -> Result<Vec<(&'static str, String)>, ServletError> {
    let q = args
        .str("q")
        .or_else(|| args.str("query"))
        .ok_or_else(|| ServletError::MissingArgument("q".into()))?;
    let mut out = vec![("q", q)];
    for key in SEARCH_KEYS {
        if let Some(v) = args.str(key) {
            out.push((*key, v));
        }
    }
    for tag in args.str_list("tag")? {
        out.push(("tag", tag));
    }
    if let Some(limit) = args.i64("limit")? {
        out.push(("limit", limit.to_string()));
    }
    Ok(out)
}

#[async_trait]
impl Servlet for BlueskyServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "post",
                "Publish a post; @handles and URLs become mentions and links",
                schema(json!({ "text": { "type": "string", "description": "Post text" } }), &["text"]),
            ),
            ToolDescription::new(
                "reply",
                "Reply to a post given its at:// URI or bsky.app link",
                schema(
                    json!({
                        "text": { "type": "string" },
                        "reply_to": { "type": "string", "description": "at:// URI or https://bsky.app/profile/... link of the parent post" }
                    }),
                    &["text", "reply_to"],
                ),
            ),
            ToolDescription::new(
                "search",
                "Search posts",
                schema(
                    json!({
                        "q": { "type": "string", "description": "Search query" },
                        "sort": { "type": "string", "enum": ["top", "latest"] },
                        "since": { "type": "string", "description": "RFC 3339 lower bound" },
                        "until": { "type": "string", "description": "RFC 3339 upper bound" },
                        "mentions": { "type": "string" },
                        "author": { "type": "string" },
                        "lang": { "type": "string" },
                        "domain": { "type": "string" },
                        "url": { "type": "string" },
                        "tag": { "type": "array", "items": { "type": "string" } },
                        "limit": { "type": "integer", "minimum": 1, "maximum": 100 },
                        "cursor": { "type": "string" }
                    }),
                    &["q"],
                ),
            ),
            ToolDescription::new(
                "get-thread",
                "Get a post thread",
                schema(
                    json!({
                        "uri": { "type": "string", "description": "at:// URI or bsky.app link" },
                        "depth": { "type": "integer", "default": 6 },
                        "parentHeight": { "type": "integer", "default": 80 }
                    }),
                    &["uri"],
                ),
            ),
            ToolDescription::new(
                "latest-mentions",
                "Recent posts mentioning the configured account",
                schema(
                    json!({
                        "within": { "type": "string", "default": "5m", "description": "Look-back window such as 30s, 5m, 2h or 1d" },
                        "limit": { "type": "integer", "default": 25 }
                    }),
                    &[],
                ),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let client = self.client()?;
        let out = match tool {
            "post" => {
                let text = args.require_text("text")?;
                self.post(&client, &text, None).await?
            }
            "reply" => {
                let text = args.require_text("text")?;
                let parent = AtUri::parse(&args.require_str("reply_to")?)?;
                let refs = reply_refs(&client, &parent).await?;
                self.post(&client, &text, Some(refs)).await?
            }
            "search" => client.search_posts(&search_query(args)?).await?,
            "get-thread" => {
                let raw = args.require_str("uri")?;
                let uri = AtUri::parse(&raw)?.to_string();
                let depth = args.i64_or("depth", 6)?;
                let parent_height = args.i64_or("parentHeight", 80)?;
                client.get_post_thread(&uri, depth, parent_height).await?
            }
            "latest-mentions" => {
                let handle = self.config.require("handle")?;
                let within = args.str("within").unwrap_or_else(|| "5m".into());
                let since = window_start(&within)?;
                let q = vec![
                    ("q", handle.clone()),
                    ("mentions", handle),
                    ("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("sort", "latest".to_string()),
                    ("limit", args.i64_or("limit", 25)?.to_string()),
                ];
                client.search_posts(&q).await?
            }
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        Ok(CallResult::text(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn servlet(base: &str) -> BlueskyServlet {
        BlueskyServlet::new(ServletConfig::from_pairs(
            "bluesky",
            [("base-url", base), ("handle", "me.test"), ("app-password", "pw")],
        ))
    }

    fn args(v: JsonValue) -> Args {
        Args::from_value(&v).unwrap()
    }

    fn mock_login(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/xrpc/com.atproto.server.createSession");
            then.status(200).body("{\"accessJwt\":\"jwt\",\"did\":\"did:plc:me\"}");
        });
    }

    #[test]
    fn parses_within_windows() {
        assert_eq!(parse_within("5m").unwrap(), Duration::minutes(5));
        assert_eq!(parse_within("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_within("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_within("1d").unwrap(), Duration::days(1));
        assert_eq!(parse_within("10x").unwrap_err().to_string(), "invalid duration: 10x");
        assert!(parse_within("m").is_err());
        assert!(parse_within("").is_err());
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let err = window_start("99999999999999d").unwrap_err();
        assert_eq!(err.to_string(), "invalid duration: 99999999999999d");
        assert!(window_start("100000000000d").is_err());
        assert!(window_start("5m").unwrap() < Utc::now());
    }

    #[tokio::test]
    async fn missing_credentials_are_reported() {
        let s = BlueskyServlet::new(ServletConfig::from_pairs("bluesky", [("handle", "me.test")]));
        let err = s.call("post", &args(json!({"text":"hi"}))).await.unwrap_err();
        assert_eq!(err.to_string(), "missing configuration: app-password");
    }

    #[tokio::test]
    async fn post_creates_record_for_session_did() {
        let server = MockServer::start();
        mock_login(&server);
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/xrpc/com.atproto.repo.createRecord")
                .header("authorization", "Bearer jwt")
                .json_body_partial(
                    r#"{"repo":"did:plc:me","collection":"app.bsky.feed.post",
                        "record":{"$type":"app.bsky.feed.post","text":"read https://docs.rs"}}"#,
                );
            then.status(200).body("{\"uri\":\"at://did:plc:me/app.bsky.feed.post/1\",\"cid\":\"c1\"}");
        });
        let out = servlet(&server.base_url())
            .call("post", &args(json!({"text":"read https://docs.rs"})))
            .await
            .unwrap();
        create.assert();
        assert!(out.first_text().unwrap().contains("\"cid\":\"c1\""));
    }

    #[tokio::test]
    async fn reply_uses_parent_root() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/xrpc/com.atproto.repo.getRecord")
                .query_param("repo", "alice.test")
                .query_param("rkey", "p2");
            then.status(200).body(
                json!({
                    "uri": "at://did:plc:alice/app.bsky.feed.post/p2",
                    "cid": "cid-parent",
                    "value": { "reply": { "root": { "uri": "at://did:plc:bob/app.bsky.feed.post/r1", "cid": "x" } } }
                })
                .to_string(),
            );
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/xrpc/com.atproto.repo.getRecord")
                .query_param("repo", "did:plc:bob")
                .query_param("rkey", "r1");
            then.status(200)
                .body(json!({ "uri": "at://did:plc:bob/app.bsky.feed.post/r1", "cid": "cid-root", "value": {} }).to_string());
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/xrpc/com.atproto.repo.createRecord").json_body_partial(
                r#"{"record":{"reply":{
                    "root":{"uri":"at://did:plc:bob/app.bsky.feed.post/r1","cid":"cid-root"},
                    "parent":{"uri":"at://did:plc:alice/app.bsky.feed.post/p2","cid":"cid-parent"}}}}"#,
            );
            then.status(200).body("{}");
        });
        servlet(&server.base_url())
            .call(
                "reply",
                &args(json!({"text":"agreed","reply_to":"https://bsky.app/profile/alice.test/post/p2"})),
            )
            .await
            .unwrap();
        create.assert();
    }

    #[tokio::test]
    async fn latest_mentions_searches_for_handle() {
        let server = MockServer::start();
        mock_login(&server);
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/xrpc/app.bsky.feed.searchPosts")
                .query_param("q", "me.test")
                .query_param("mentions", "me.test")
                .query_param("sort", "latest")
                .query_param("limit", "25")
                .query_param_exists("since");
            then.status(200).body("{\"posts\":[]}");
        });
        let out = servlet(&server.base_url()).call("latest-mentions", &args(json!({}))).await.unwrap();
        search.assert();
        assert_eq!(out.first_text(), Some("{\"posts\":[]}"));
    }

    #[tokio::test]
    async fn get_thread_accepts_web_links() {
        let server = MockServer::start();
        mock_login(&server);
        let thread = server.mock(|when, then| {
            when.method(GET)
                .path("/xrpc/app.bsky.feed.getPostThread")
                .query_param("uri", "at://alice.test/app.bsky.feed.post/abc")
                .query_param("depth", "2")
                .query_param("parentHeight", "80");
            then.status(200).body("{\"thread\":{}}");
        });
        servlet(&server.base_url())
            .call("get-thread", &args(json!({"uri":"https://bsky.app/profile/alice.test/post/abc","depth":2})))
            .await
            .unwrap();
        thread.assert();
    }
}
