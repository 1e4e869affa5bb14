//! OneDrive files through Microsoft Graph.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::schema;
use crate::clients::onedrive::{drive_path, OneDriveClient, DEFAULT_BASE, MAX_TOP};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

pub struct OnedriveServlet {
    config: ServletConfig,
}

impl OnedriveServlet {
    pub const NAME: &'static str = "onedrive";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> Result<OneDriveClient, ServletError> {
        Ok(OneDriveClient::new(self.config.base_url("base-url", DEFAULT_BASE), self.config.require("oauth-token")?))
    }
}

/// `$top` (clamped) and, when `sortable`, `$orderby`.
fn paging(args: &Args, sortable: bool) -> Result<Vec<(&'static str, String)>, ServletError> {
    let mut q = Vec::new();
    if let Some(top) = args.u64("top")?.filter(|t| *t > 0) {
        q.push(("$top", top.min(MAX_TOP).to_string()));
    }
    if sortable {
        if let Some(order) = args.str("orderby") {
            q.push(("$orderby", order));
        }
    }
    Ok(q)
}

fn item(id: &str) -> String {
    format!("items/{}", urlencoding::encode(id))
}

/// Children collection of `parent` or of the drive root.
fn children_of(drive: Option<&str>, parent: Option<&str>) -> String {
    match parent {
        Some(p) => drive_path(drive, &format!("{}/children", item(p))),
        None => drive_path(drive, "root/children"),
    }
}

fn drive_prop() -> JsonValue {
    json!({ "type": "string", "description": "Drive ID; omit for the default drive" })
}

fn top_prop() -> JsonValue {
    json!({ "type": "integer", "description": "Number of items to return", "maximum": MAX_TOP })
}

fn orderby_prop() -> JsonValue {
    json!({ "type": "string", "description": "Sort property, e.g. name or lastModifiedDateTime desc" })
}

#[async_trait]
impl Servlet for OnedriveServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "list-drive-items",
                "List items in the root of a drive",
                schema(json!({ "drive_id": drive_prop(), "top": top_prop(), "orderby": orderby_prop() }), &[]),
            ),
            ToolDescription::new(
                "recent-files",
                "List recently used files",
                schema(json!({ "drive_id": drive_prop(), "top": top_prop() }), &[]),
            ),
            ToolDescription::new(
                "shared-with-me",
                "List items other people shared with the user",
                schema(json!({ "top": top_prop() }), &[]),
            ),
            ToolDescription::new(
                "search",
                "Search a drive for files and folders",
                schema(
                    json!({ "query": { "type": "string" }, "drive_id": drive_prop(), "top": top_prop() }),
                    &["query"],
                ),
            ),
            ToolDescription::new(
                "create-folder",
                "Create a folder; an existing name gets renamed",
                schema(
                    json!({
                        "name": { "type": "string" },
                        "parent_id": { "type": "string", "description": "Parent folder ID; omit for the root" },
                        "drive_id": drive_prop()
                    }),
                    &["name"],
                ),
            ),
            ToolDescription::new("list-drive-children", "List the drives available to the user", schema(json!({}), &[])),
            ToolDescription::new(
                "list-folder-children",
                "List the contents of a folder",
                schema(
                    json!({
                        "folder_id": { "type": "string" },
                        "drive_id": drive_prop(),
                        "top": top_prop(),
                        "orderby": orderby_prop()
                    }),
                    &["folder_id"],
                ),
            ),
            ToolDescription::new(
                "upload-file",
                "Upload a small file from text content",
                schema(
                    json!({
                        "name": { "type": "string" },
                        "content": { "type": "string" },
                        "parent_id": { "type": "string", "description": "Parent folder ID; omit for the root" },
                        "content_type": { "type": "string", "default": "application/octet-stream" },
                        "drive_id": drive_prop()
                    }),
                    &["name", "content"],
                ),
            ),
            ToolDescription::new(
                "get-item",
                "Get metadata of a file or folder",
                schema(json!({ "item_id": { "type": "string" }, "drive_id": drive_prop() }), &["item_id"]),
            ),
            ToolDescription::new(
                "get-drive-info",
                "Get information about a drive",
                schema(json!({ "drive_id": drive_prop() }), &[]),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let drive_id = args.str("drive_id");
        let drive = drive_id.as_deref();
        let out = match tool {
            "list-drive-items" => {
                let q = paging(args, true)?;
                self.client()?.get(&drive_path(drive, "root/children"), &q, "list drive items").await?
            }
            "recent-files" => {
                let q = paging(args, false)?;
                self.client()?.get(&drive_path(drive, "recent"), &q, "get recent files").await?
            }
            "shared-with-me" => {
                let q = paging(args, false)?;
                self.client()?.get("me/drive/sharedWithMe", &q, "get shared files").await?
            }
            "search" => {
                let query = args.require_str("query")?;
                let path = drive_path(drive, &format!("root/search(q='{}')", urlencoding::encode(&query)));
                let q = paging(args, false)?;
                self.client()?.get(&path, &q, "search drive").await?
            }
            "create-folder" => {
                let name = args.require_str("name")?;
                let body = json!({
                    "name": name,
                    "folder": {},
                    "@microsoft.graph.conflictBehavior": "rename"
                });
                let parent = args.str("parent_id");
                self.client()?
                    .post(&children_of(drive, parent.as_deref()), &body, "create folder")
                    .await?
            }
            "list-drive-children" => self.client()?.get("me/drives", &[], "list drives").await?,
            "list-folder-children" => {
                let folder = args.require_str("folder_id")?;
                let q = paging(args, true)?;
                self.client()?
                    .get(&children_of(drive, Some(&folder)), &q, "list folder children")
                    .await?
            }
            "upload-file" => {
                let name = args.require_str("name")?;
                let content = args.require_text("content")?;
                let content_type = args.str("content_type").unwrap_or_else(|| "application/octet-stream".into());
                let target = match args.str("parent_id") {
                    Some(p) => format!("{}:/{}:/content", item(&p), urlencoding::encode(&name)),
                    None => format!("root:/{}:/content", urlencoding::encode(&name)),
                };
                self.client()?
                    .put_content(&drive_path(drive, &target), content.into_bytes(), &content_type, "upload file")
                    .await?
            }
            "get-item" => {
                let id = args.require_str("item_id")?;
                self.client()?.get(&drive_path(drive, &item(&id)), &[], "get item").await?
            }
            "get-drive-info" => self.client()?.get(&drive_path(drive, ""), &[], "get drive info").await?,
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        Ok(CallResult::text(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn servlet(base: &str) -> OnedriveServlet {
        OnedriveServlet::new(ServletConfig::from_pairs("onedrive", [("oauth-token", "tok"), ("base-url", base)]))
    }

    fn args(v: JsonValue) -> Args {
        Args::from_value(&v).unwrap()
    }

    #[test]
    fn top_is_clamped() {
        let q = paging(&args(json!({"top": 5000, "orderby": "name"})), true).unwrap();
        assert_eq!(q, vec![("$top", "999".to_string()), ("$orderby", "name".to_string())]);
        assert!(paging(&args(json!({"orderby": "name"})), false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_drive_items_on_named_drive() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/drives/d1/root/children")
                .query_param("$top", "10")
                .header("authorization", "Bearer tok");
            then.status(200).body("{\"value\":[]}");
        });
        let out = servlet(&server.base_url())
            .call("list-drive-items", &args(json!({"drive_id":"d1","top":10})))
            .await
            .unwrap();
        m.assert();
        assert_eq!(out.first_text(), Some("{\"value\":[]}"));
    }

    #[tokio::test]
    async fn create_folder_under_parent() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST).path("/me/drive/items/p1/children").json_body(json!({
                "name": "Reports",
                "folder": {},
                "@microsoft.graph.conflictBehavior": "rename"
            }));
            then.status(201).body("{\"id\":\"f1\"}");
        });
        servlet(&server.base_url())
            .call("create-folder", &args(json!({"name":"Reports","parent_id":"p1"})))
            .await
            .unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn search_uses_root_search_function() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path_contains("/me/drive/root/search").path_contains("budget");
            then.status(200).body("{\"value\":[]}");
        });
        servlet(&server.base_url()).call("search", &args(json!({"query":"budget"}))).await.unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn failures_name_the_action() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/me/drive/items/x");
            then.status(404).body("itemNotFound");
        });
        let err = servlet(&server.base_url())
            .call("get-item", &args(json!({"item_id":"x"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get item: 404 itemNotFound");
    }

    #[tokio::test]
    async fn missing_token_is_reported() {
        let s = OnedriveServlet::new(ServletConfig::from_pairs("onedrive", [("oauth-token", "")]));
        let err = s.call("list-drive-children", &args(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "missing configuration: oauth-token");
    }
}
