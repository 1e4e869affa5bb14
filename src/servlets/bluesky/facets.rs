//! Rich-text facets: mention and link spans over the UTF-8 bytes of a post.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::clients::atproto::AtprotoClient;
use crate::core::error::ServletError;

const MENTION_PATTERN: &str = r"(@[a-zA-Z0-9.-]+)";
const LINK_PATTERN: &str = r"(https?://[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}[a-zA-Z0-9/\-._?=&%]*)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    /// Handle without the leading `@`.
    Mention(String),
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facet {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub index: ByteSlice,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ByteSlice {
    #[serde(rename = "byteStart")]
    pub byte_start: usize,
    #[serde(rename = "byteEnd")]
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "$type")]
pub enum Feature {
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
}

fn compiled(cell: &'static OnceLock<Result<Regex, regex::Error>>, pattern: &str) -> Result<&'static Regex, ServletError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| ServletError::Message(format!("invalid facet pattern: {e}")))
}

/// Mention and link spans in byte order. A trailing `.` is not part of a handle.
pub fn find_spans(text: &str) -> Result<Vec<Span>, ServletError> {
    static MENTION: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    static LINK: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

    let links: Vec<Span> = compiled(&LINK, LINK_PATTERN)?
        .find_iter(text)
        .map(|m| Span { start: m.start(), end: m.end(), kind: SpanKind::Link(m.as_str().to_string()) })
        .collect();

    let mut spans: Vec<Span> = compiled(&MENTION, MENTION_PATTERN)?
        .find_iter(text)
        .filter_map(|m| {
            let handle = m.as_str()[1..].trim_end_matches('.');
            if handle.is_empty() {
                return None;
            }
            Some(Span {
                start: m.start(),
                end: m.start() + 1 + handle.len(),
                kind: SpanKind::Mention(handle.to_string()),
            })
        })
        .collect();

    spans.extend(links);
    spans.sort_by_key(|s| s.start);
    Ok(spans)
}

/// Facets for a post; mentions whose handle does not resolve stay plain text.
pub async fn parse_facets(text: &str, client: &AtprotoClient) -> Result<Vec<Facet>, ServletError> {
    let mut facets = Vec::new();
    for span in find_spans(text)? {
        let feature = match span.kind {
            SpanKind::Mention(handle) => match client.resolve_handle(&handle).await? {
                Some(did) => Feature::Mention { did },
                None => continue,
            },
            SpanKind::Link(uri) => Feature::Link { uri },
        };
        facets.push(Facet {
            kind: "app.bsky.richtext.facet",
            index: ByteSlice { byte_start: span.start, byte_end: span.end },
            features: vec![feature],
        });
    }
    Ok(facets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::runtime::token::TokenCache;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn spans_use_byte_offsets() {
        let spans = find_spans("✨ hi @alice.bsky.social see https://example.com/a?b=1").unwrap();
        assert_eq!(spans.len(), 2);
        // '✨' is three bytes
        assert_eq!(spans[0], Span { start: 7, end: 25, kind: SpanKind::Mention("alice.bsky.social".into()) });
        assert_eq!(spans[1].start, 30);
        assert_eq!(spans[1].kind, SpanKind::Link("https://example.com/a?b=1".into()));
    }

    #[test]
    fn trailing_dot_is_not_part_of_a_handle() {
        let spans = find_spans("thanks @bob.test. and https://x.org/").unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, SpanKind::Mention("bob.test".into()));
        assert_eq!(spans[0].end - spans[0].start, "@bob.test".len());
        assert!(matches!(spans[1].kind, SpanKind::Link(_)));
    }

    #[tokio::test]
    async fn builds_facets_and_skips_unknown_handles() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/xrpc/com.atproto.identity.resolveHandle")
                .query_param("handle", "alice.test");
            then.status(200).body("{\"did\":\"did:plc:alice\"}");
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/xrpc/com.atproto.identity.resolveHandle")
                .query_param("handle", "nobody.test");
            then.status(400).body("{}");
        });
        let client = AtprotoClient::new(server.base_url(), "h", "p", TokenCache::new());
        let facets = parse_facets("@alice.test @nobody.test https://rust-lang.org", &client).await.unwrap();
        let v = serde_json::to_value(&facets).unwrap();
        assert_eq!(
            v,
            json!([
                {
                    "$type": "app.bsky.richtext.facet",
                    "index": { "byteStart": 0, "byteEnd": 11 },
                    "features": [{ "$type": "app.bsky.richtext.facet#mention", "did": "did:plc:alice" }]
                },
                {
                    "$type": "app.bsky.richtext.facet",
                    "index": { "byteStart": 25, "byteEnd": 46 },
                    "features": [{ "$type": "app.bsky.richtext.facet#link", "uri": "https://rust-lang.org" }]
                }
            ])
        );
    }
}
