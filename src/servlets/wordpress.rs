//! WordPress posts, taxonomies and comments, self-hosted or on WordPress.com.

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};

use super::schema;
use crate::clients::wordpress::{
    fetch_token, Auth, PasswordGrant, WordpressClient, DEFAULT_API_BASE, DEFAULT_TOKEN_URL,
};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;
use crate::infra::runtime::token::TokenCache;

pub struct WordpressServlet {
    config: ServletConfig,
    token: TokenCache<String>,
}

/// A category or tag given by id or by name.
#[derive(Debug, Clone, PartialEq)]
enum TermRef {
    Id(i64),
    Name(String),
}

/// Site domain from the configured website URL.
fn site_domain(url: &str) -> &str {
    url.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

fn is_self_hosted(on_prem: Option<&str>) -> bool {
    !matches!(
        on_prem.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("no" | "false" | "0")
    )
}

impl WordpressServlet {
    pub const NAME: &'static str = "wordpress";

    pub fn new(config: ServletConfig) -> Self {
        Self { config, token: TokenCache::new() }
    }

    async fn client(&self) -> Result<WordpressClient, ServletError> {
        let website = self.config.require("website-url")?;
        let username = self.config.require("username")?;
        let password = self.config.require("app-password")?;

        if is_self_hosted(self.config.get("on-prem").as_deref()) {
            let base = format!("{}/wp-json/wp/v2", website.trim().trim_end_matches('/'));
            return Ok(WordpressClient::new(base, Auth::Basic { username, password }));
        }

        let client_id = self.config.require("client-id")?;
        let client_secret = self.config.require("client-secret")?;
        let token_url = self.config.get_or("token-url", DEFAULT_TOKEN_URL);
        let grant = PasswordGrant {
            client_id: &client_id,
            client_secret: &client_secret,
            username: &username,
            password: &password,
        };
        let token = self.token.get_or_refresh(|| fetch_token(&token_url, &grant)).await?;
        let base = format!(
            "{}/wp/v2/sites/{}",
            self.config.base_url("api-base-url", DEFAULT_API_BASE),
            site_domain(&website)
        );
        Ok(WordpressClient::new(base, Auth::Bearer(token)))
    }
}

fn term_refs(args: &Args, key: &str) -> Result<Vec<TermRef>, ServletError> {
    let items = match args.raw(key) {
        None => return Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items.clone(),
        Some(JsonValue::String(_)) => args.str_list(key)?.into_iter().map(JsonValue::String).collect(),
        Some(_) => return Err(ServletError::invalid(format!("{key} must be a list of ids or names"))),
    };
    let mut out = Vec::new();
    for item in items {
        match item {
            JsonValue::Number(n) => match n.as_i64() {
                Some(id) => out.push(TermRef::Id(id)),
                None => return Err(ServletError::invalid(format!("{key} ids must be integers"))),
            },
            JsonValue::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    continue;
                }
                match s.parse::<i64>() {
                    Ok(id) => out.push(TermRef::Id(id)),
                    Err(_) => out.push(TermRef::Name(s.to_string())),
                }
            }
            JsonValue::Null => {}
            _ => return Err(ServletError::invalid(format!("{key} must be a list of ids or names"))),
        }
    }
    Ok(out)
}

/// Ids for the given terms; unknown names are created.
async fn resolve_terms(wp: &WordpressClient, taxonomy: &str, refs: Vec<TermRef>) -> Result<Vec<i64>, ServletError> {
    let mut ids = Vec::with_capacity(refs.len());
    for r in refs {
        let name = match r {
            TermRef::Id(id) => {
                ids.push(id);
                continue;
            }
            TermRef::Name(n) => n,
        };
        let existing = wp.search_terms(taxonomy, &name).await?;
        if let Some(t) = existing.iter().find(|t| t.name.eq_ignore_ascii_case(&name)) {
            ids.push(t.id);
            continue;
        }
        tracing::info!(taxonomy, name = %name, "creating missing term");
        let created = wp.create_term(taxonomy, &json!({ "name": name })).await?;
        ids.push(created.id);
    }
    Ok(ids)
}

/// Post body from the optional fields shared by create and edit.
async fn post_body(wp: &WordpressClient, args: &Args) -> Result<Map<String, JsonValue>, ServletError> {
    let mut body = Map::new();
    for key in ["title", "content", "status", "excerpt"] {
        if let Some(v) = args.text(key) {
            body.insert(key.into(), JsonValue::String(v));
        }
    }
    if let Some(featured) = args.bool("featured")? {
        body.insert("sticky".into(), JsonValue::Bool(featured));
    }
    if let Some(meta) = args.object("meta")? {
        body.insert("meta".into(), JsonValue::Object(meta));
    }
    for taxonomy in ["categories", "tags"] {
        let refs = term_refs(args, taxonomy)?;
        if !refs.is_empty() {
            body.insert(taxonomy.into(), json!(resolve_terms(wp, taxonomy, refs).await?));
        }
    }
    Ok(body)
}

fn post_fields() -> Map<String, JsonValue> {
    let terms = json!({
        "type": "array",
        "items": { "type": ["integer", "string"] },
        "description": "Ids or names; unknown names are created"
    });
    let props = json!({
        "title": { "type": "string" },
        "content": { "type": "string", "description": "Post body (HTML)" },
        "status": { "type": "string", "enum": ["publish", "draft", "pending", "private", "future"] },
        "categories": terms.clone(),
        "tags": terms,
        "featured": { "type": "boolean", "description": "Stick the post to the front page" },
        "excerpt": { "type": "string" },
        "meta": { "type": "object", "description": "Registered post meta fields" }
    });
    match props {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
}

fn post_id() -> JsonValue {
    json!({ "type": "integer", "description": "Post ID" })
}

#[async_trait]
impl Servlet for WordpressServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        let mut edit = post_fields();
        edit.insert("post_id".into(), post_id());
        vec![
            ToolDescription::new(
                "wp_post_create",
                "Create a WordPress post",
                schema(JsonValue::Object(post_fields()), &["title", "content"]),
            ),
            ToolDescription::new("wp_post_edit", "Edit an existing post", schema(JsonValue::Object(edit), &["post_id"])),
            ToolDescription::new("wp_post_get", "Get a post", schema(json!({ "post_id": post_id() }), &["post_id"])),
            ToolDescription::new(
                "wp_post_delete",
                "Trash a post, or delete it permanently with force",
                schema(json!({ "post_id": post_id(), "force": { "type": "boolean", "default": false } }), &["post_id"]),
            ),
            ToolDescription::new(
                "wp_post_list",
                "List posts",
                schema(
                    json!({
                        "page": { "type": "integer" },
                        "per_page": { "type": "integer", "maximum": 100 },
                        "status": { "type": "string" },
                        "category": { "type": "integer", "description": "Category ID" },
                        "tag": { "type": "integer", "description": "Tag ID" }
                    }),
                    &[],
                ),
            ),
            ToolDescription::new(
                "wp_post_schedule",
                "Schedule a post for future publication",
                schema(
                    json!({ "post_id": post_id(), "date": { "type": "string", "description": "Publish date, ISO 8601 in the site's timezone" } }),
                    &["post_id", "date"],
                ),
            ),
            ToolDescription::new("wp_category_list", "List categories", schema(json!({}), &[])),
            ToolDescription::new(
                "wp_category_create",
                "Create a category",
                schema(
                    json!({
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "parent": { "type": "integer", "description": "Parent category ID" }
                    }),
                    &["name"],
                ),
            ),
            ToolDescription::new("wp_tag_list", "List tags", schema(json!({}), &[])),
            ToolDescription::new(
                "wp_tag_create",
                "Create a tag",
                schema(json!({ "name": { "type": "string" }, "description": { "type": "string" } }), &["name"]),
            ),
            ToolDescription::new(
                "wp_comment_list",
                "List comments, optionally for one post",
                schema(json!({ "post_id": post_id() }), &[]),
            ),
            ToolDescription::new(
                "wp_comment_approve",
                "Approve a comment",
                schema(json!({ "comment_id": { "type": "integer" } }), &["comment_id"]),
            ),
            ToolDescription::new(
                "wp_comment_delete",
                "Trash a comment, or delete it permanently with force",
                schema(
                    json!({ "comment_id": { "type": "integer" }, "force": { "type": "boolean", "default": false } }),
                    &["comment_id"],
                ),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let wp = self.client().await?;
        let out = match tool {
            "wp_post_create" => {
                args.require_text("title")?;
                args.require_text("content")?;
                let body = post_body(&wp, args).await?;
                wp.post("posts", &JsonValue::Object(body)).await?
            }
            "wp_post_edit" => {
                let id = args.require_i64("post_id")?;
                let body = post_body(&wp, args).await?;
                wp.post(&format!("posts/{id}"), &JsonValue::Object(body)).await?
            }
            "wp_post_get" => {
                let id = args.require_i64("post_id")?;
                wp.get(&format!("posts/{id}"), &[]).await?
            }
            "wp_post_delete" => {
                let id = args.require_i64("post_id")?;
                wp.delete(&format!("posts/{id}"), args.bool_or("force", false)?).await?
            }
            "wp_post_list" => {
                let mut q = Vec::new();
                for (arg, param) in [("page", "page"), ("per_page", "per_page"), ("category", "categories"), ("tag", "tags")] {
                    if let Some(v) = args.i64(arg)? {
                        q.push((param, v.to_string()));
                    }
                }
                if let Some(status) = args.str("status") {
                    q.push(("status", status));
                }
                wp.get("posts", &q).await?
            }
            "wp_post_schedule" => {
                let id = args.require_i64("post_id")?;
                let date = args.require_str("date")?;
                wp.post(&format!("posts/{id}"), &json!({ "status": "future", "date": date })).await?
            }
            "wp_category_list" => wp.get("categories", &[]).await?,
            "wp_category_create" => {
                let mut body = json!({ "name": args.require_str("name")? });
                if let Some(d) = args.text("description") {
                    body["description"] = JsonValue::String(d);
                }
                if let Some(p) = args.i64("parent")? {
                    body["parent"] = json!(p);
                }
                wp.post("categories", &body).await?
            }
            "wp_tag_list" => wp.get("tags", &[]).await?,
            "wp_tag_create" => {
                let mut body = json!({ "name": args.require_str("name")? });
                if let Some(d) = args.text("description") {
                    body["description"] = JsonValue::String(d);
                }
                wp.post("tags", &body).await?
            }
            "wp_comment_list" => {
                let mut q = Vec::new();
                if let Some(id) = args.i64("post_id")? {
                    q.push(("post", id.to_string()));
                }
                wp.get("comments", &q).await?
            }
            "wp_comment_approve" => {
                let id = args.require_i64("comment_id")?;
                wp.post(&format!("comments/{id}"), &json!({ "status": "approved" })).await?
            }
            "wp_comment_delete" => {
                let id = args.require_i64("comment_id")?;
                wp.delete(&format!("comments/{id}"), args.bool_or("force", false)?).await?
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

    fn args(v: JsonValue) -> Args {
        Args::from_value(&v).unwrap()
    }

    fn self_hosted(base: &str) -> WordpressServlet {
        WordpressServlet::new(ServletConfig::from_pairs(
            "wordpress",
            [("website-url", base), ("username", "admin"), ("app-password", "secret")],
        ))
    }

    #[test]
    fn detects_hosting_mode() {
        assert!(is_self_hosted(None));
        assert!(is_self_hosted(Some("yes")));
        assert!(!is_self_hosted(Some("no")));
        assert!(!is_self_hosted(Some("False")));
        assert!(!is_self_hosted(Some("0")));
        assert_eq!(site_domain("https://blog.example.com/"), "blog.example.com");
    }

    #[test]
    fn term_refs_split_ids_and_names() {
        let a = args(json!({"tags": [3, "7", "Rust", ""], "categories": "News, 12"}));
        assert_eq!(
            term_refs(&a, "tags").unwrap(),
            vec![TermRef::Id(3), TermRef::Id(7), TermRef::Name("Rust".into())]
        );
        assert_eq!(
            term_refs(&a, "categories").unwrap(),
            vec![TermRef::Name("News".into()), TermRef::Id(12)]
        );
    }

    #[tokio::test]
    async fn create_post_resolves_and_creates_terms() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/wp-json/wp/v2/tags").query_param("search", "rust");
            then.status(200).body("[{\"id\":41,\"name\":\"Rust\"},{\"id\":42,\"name\":\"rustacean\"}]");
        });
        server.mock(|when, then| {
            when.method(GET).path("/wp-json/wp/v2/tags").query_param("search", "Tokio");
            then.status(200).body("[]");
        });
        let created = server.mock(|when, then| {
            when.method(POST).path("/wp-json/wp/v2/tags").json_body(json!({"name":"Tokio"}));
            then.status(201).body("{\"id\":77,\"name\":\"Tokio\"}");
        });
        let post = server.mock(|when, then| {
            when.method(POST).path("/wp-json/wp/v2/posts").json_body(json!({
                "title": "Hello", "content": "<p>hi</p>", "status": "draft", "tags": [41, 77, 5]
            }));
            then.status(201).body("{\"id\":1}");
        });
        let out = self_hosted(&server.base_url())
            .call(
                "wp_post_create",
                &args(json!({"title":"Hello","content":"<p>hi</p>","status":"draft","tags":["rust","Tokio",5]})),
            )
            .await
            .unwrap();
        created.assert();
        post.assert();
        assert_eq!(out.first_text(), Some("{\"id\":1}"));
    }

    #[tokio::test]
    async fn schedule_sets_future_status() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/wp-json/wp/v2/posts/5")
                .json_body(json!({"status":"future","date":"2030-01-01T09:00:00"}));
            then.status(200).body("{\"id\":5}");
        });
        self_hosted(&server.base_url())
            .call("wp_post_schedule", &args(json!({"post_id":5,"date":"2030-01-01T09:00:00"})))
            .await
            .unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn wordpress_com_uses_cached_bearer_token() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST).path("/oauth2/token").body_contains("client_id=cid");
            then.status(200).body("{\"access_token\":\"wpcom\"}");
        });
        let list = server.mock(|when, then| {
            when.method(GET)
                .path("/wp/v2/sites/blog.example.com/categories")
                .header("authorization", "Bearer wpcom");
            then.status(200).body("[]");
        });
        let token_url = server.url("/oauth2/token");
        let base = server.base_url();
        let s = WordpressServlet::new(ServletConfig::from_pairs(
            "wordpress",
            [
                ("website-url", "https://blog.example.com/"),
                ("on-prem", "no"),
                ("username", "writer"),
                ("app-password", "pw"),
                ("client-id", "cid"),
                ("client-secret", "cs"),
                ("api-base-url", base.as_str()),
                ("token-url", token_url.as_str()),
            ],
        ));
        s.call("wp_category_list", &args(json!({}))).await.unwrap();
        s.call("wp_category_list", &args(json!({}))).await.unwrap();
        token.assert_hits(1);
        list.assert_hits(2);
    }

    #[tokio::test]
    async fn missing_post_id_is_reported() {
        let err = self_hosted("http://unused")
            .call("wp_post_get", &args(json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing required argument: post_id");
    }
}
