//! Trello boards, lists, cards, labels, checklists and comments.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value as JsonValue};

use super::schema;
use crate::clients::trello::{authorize_url, TrelloClient, DEFAULT_AUTHORIZE_URL, DEFAULT_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

const APP_NAME: &str = "mcp-servlets";
const LABEL_COLORS: &[&str] = &["red", "yellow", "green", "blue", "purple", "orange", "black", "sky", "lime", "pink"];
const AUTH_INSTRUCTIONS: &str = "1. Visit this URL in your browser:\n2. Click 'Allow' to grant access\n3. Copy the token shown on the next page\n4. Pass in the token as the 'token' parameter to other Trello tools";
const TOKEN_NOTE: &str = "Note: You must provide a 'token' parameter to use Trello tools";

pub struct TrelloServlet {
    config: ServletConfig,
}

impl TrelloServlet {
    pub const NAME: &'static str = "trello";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }

    fn auth_text(&self) -> Result<String, ServletError> {
        let key = self.config.require("api-key")?;
        let base = self.config.get_or("authorize-url", DEFAULT_AUTHORIZE_URL);
        let url = authorize_url(&base, &key, APP_NAME);
        let mut lines = AUTH_INSTRUCTIONS.lines();
        let first = lines.next().unwrap_or_default();
        let rest: Vec<&str> = lines.collect();
        Ok(format!("{first}\n{url}\n{}", rest.join("\n")))
    }
}

fn token_prop() -> (String, JsonValue) {
    (
        "token".into(),
        json!({ "type": "string", "description": "Trello user token from auth_get_url" }),
    )
}

/// Tool schema with the shared `token` property added.
fn tool(name: &str, description: &str, props: JsonValue, required: &[&str]) -> ToolDescription {
    let mut p = match props {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    };
    let (k, v) = token_prop();
    p.insert(k, v);
    let mut req: Vec<&str> = required.to_vec();
    req.push("token");
    ToolDescription::new(name, description, schema(JsonValue::Object(p), &req))
}

fn id(desc: &str) -> JsonValue {
    json!({ "type": "string", "description": desc })
}

/// JSON object from the given present optional string args, renamed.
/// Required ID argument, percent-encoded for use as one path segment.
fn segment(args: &Args, key: &str) -> Result<String, ServletError> {
    Ok(urlencoding::encode(&args.require_str(key)?).into_owned())
}

fn body_of(args: &Args, pairs: &[(&str, &str)]) -> JsonValue {
    let mut m = Map::new();
    for (arg, field) in pairs {
        if let Some(v) = args.text(arg) {
            m.insert((*field).to_string(), JsonValue::String(v));
        }
    }
    JsonValue::Object(m)
}

#[async_trait]
impl Servlet for TrelloServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "auth_get_url",
                "Get the URL a user visits to authorize this app and obtain a Trello token",
                schema(json!({}), &[]),
            ),
            tool(
                "board_list",
                "List boards of the current member",
                json!({ "filter": { "type": "string", "enum": ["all", "closed", "members", "open", "organization", "public", "starred"] } }),
                &[],
            ),
            tool(
                "board_get",
                "Get a board",
                json!({ "board_id": id("Board ID"), "fields": { "type": "array", "items": { "type": "string" } } }),
                &["board_id"],
            ),
            tool(
                "board_create",
                "Create a board",
                json!({ "name": { "type": "string" }, "description": { "type": "string" } }),
                &["name"],
            ),
            tool("board_get_members", "List members of a board", json!({ "board_id": id("Board ID") }), &["board_id"]),
            tool(
                "board_add_member",
                "Invite a member to a board by email",
                json!({ "board_id": id("Board ID"), "email": { "type": "string" }, "full_name": { "type": "string" } }),
                &["board_id", "email"],
            ),
            tool(
                "board_remove_member",
                "Remove a member from a board",
                json!({ "board_id": id("Board ID"), "member_id": id("Member ID") }),
                &["board_id", "member_id"],
            ),
            tool("board_get_labels", "List labels of a board", json!({ "board_id": id("Board ID") }), &["board_id"]),
            tool(
                "board_get_lists",
                "List lists of a board",
                json!({ "board_id": id("Board ID"), "filter": { "type": "string", "enum": ["open", "closed", "all"] } }),
                &["board_id"],
            ),
            tool("board_get_cards", "List cards of a board", json!({ "board_id": id("Board ID") }), &["board_id"]),
            tool(
                "list_create",
                "Create a list on a board",
                json!({ "board_id": id("Board ID"), "name": { "type": "string" }, "position": { "type": "string", "description": "top, bottom or a positive number" } }),
                &["board_id", "name"],
            ),
            tool(
                "list_move",
                "Move a list to another board",
                json!({ "list_id": id("List ID"), "board_id": id("Destination board ID") }),
                &["list_id", "board_id"],
            ),
            tool(
                "list_get_cards",
                "List cards in a list",
                json!({ "list_id": id("List ID"), "limit": { "type": "integer", "default": 50 }, "page": { "type": "integer", "default": 0 } }),
                &["list_id"],
            ),
            tool("list_archive_cards", "Archive every card in a list", json!({ "list_id": id("List ID") }), &["list_id"]),
            tool(
                "card_create",
                "Create a card in a list",
                json!({ "list_id": id("List ID"), "name": { "type": "string" }, "description": { "type": "string" } }),
                &["list_id", "name"],
            ),
            tool(
                "card_move",
                "Move a card to another list",
                json!({ "card_id": id("Card ID"), "list_id": id("Destination list ID"), "position": { "type": "string" } }),
                &["card_id", "list_id"],
            ),
            tool("card_get_members", "List members of a card", json!({ "card_id": id("Card ID") }), &["card_id"]),
            tool(
                "card_add_member",
                "Add a member to a card",
                json!({ "card_id": id("Card ID"), "member_id": id("Member ID") }),
                &["card_id", "member_id"],
            ),
            tool(
                "card_remove_member",
                "Remove a member from a card",
                json!({ "card_id": id("Card ID"), "member_id": id("Member ID") }),
                &["card_id", "member_id"],
            ),
            tool("card_get_comments", "List comments on a card", json!({ "card_id": id("Card ID") }), &["card_id"]),
            tool(
                "card_add_comment",
                "Comment on a card",
                json!({ "card_id": id("Card ID"), "text": { "type": "string" } }),
                &["card_id", "text"],
            ),
            tool(
                "label_create",
                "Create a label on a board",
                json!({ "board_id": id("Board ID"), "name": { "type": "string" }, "color": { "type": "string", "enum": LABEL_COLORS } }),
                &["board_id", "name", "color"],
            ),
            tool("label_delete", "Delete a label", json!({ "label_id": id("Label ID") }), &["label_id"]),
            tool(
                "checklist_create",
                "Create a checklist on a card",
                json!({ "card_id": id("Card ID"), "name": { "type": "string" } }),
                &["card_id", "name"],
            ),
            tool(
                "checklist_add_item",
                "Add an item to a checklist",
                json!({ "checklist_id": id("Checklist ID"), "name": { "type": "string" } }),
                &["checklist_id", "name"],
            ),
            tool(
                "comment_delete",
                "Delete a comment from a card",
                json!({ "card_id": id("Card ID"), "action_id": id("Comment action ID") }),
                &["card_id", "action_id"],
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        if tool == "auth_get_url" {
            return Ok(CallResult::text(self.auth_text()?));
        }
        let token = match args.str("token") {
            Some(t) => t,
            None => return Ok(CallResult::text(format!("{}\n\n{TOKEN_NOTE}", self.auth_text()?))),
        };
        let key = self.config.require("api-key")?;
        let c = TrelloClient::new(self.config.base_url("base-url", DEFAULT_BASE), key, token);

        let out = match tool {
            "board_list" => {
                let mut q = Vec::new();
                if let Some(f) = args.str("filter") {
                    q.push(("filter", f));
                }
                c.get("members/me/boards", &q, "list boards").await?
            }
            "board_get" => {
                let board = segment(args, "board_id")?;
                let fields = args.str_list("fields")?;
                let mut q = Vec::new();
                if !fields.is_empty() {
                    q.push(("fields", fields.join(",")));
                }
                c.get(&format!("boards/{board}"), &q, "get board").await?
            }
            "board_create" => {
                args.require_str("name")?;
                let body = body_of(args, &[("name", "name"), ("description", "desc")]);
                c.send_json(Method::POST, "boards", &[], Some(&body), "create board").await?
            }
            "board_get_members" => {
                let board = segment(args, "board_id")?;
                c.get(&format!("boards/{board}/members"), &[], "get board members").await?
            }
            "board_add_member" => {
                let board = segment(args, "board_id")?;
                args.require_str("email")?;
                let body = body_of(args, &[("email", "email"), ("full_name", "fullName")]);
                c.send_json(Method::PUT, &format!("boards/{board}/members"), &[], Some(&body), "add board member")
                    .await?
            }
            "board_remove_member" => {
                let board = segment(args, "board_id")?;
                let member = segment(args, "member_id")?;
                c.delete(&format!("boards/{board}/members/{member}"), "remove board member").await?;
                "Member removed successfully".to_string()
            }
            "board_get_labels" => {
                let board = segment(args, "board_id")?;
                c.get(&format!("boards/{board}/labels"), &[], "get board labels").await?
            }
            "board_get_lists" => {
                let board = segment(args, "board_id")?;
                let mut q = Vec::new();
                if let Some(f) = args.str("filter") {
                    q.push(("filter", f));
                }
                c.get(&format!("boards/{board}/lists"), &q, "get board lists").await?
            }
            "board_get_cards" => {
                let board = segment(args, "board_id")?;
                c.get(&format!("boards/{board}/cards"), &[], "get board cards").await?
            }
            "list_create" => {
                let board = args.require_str("board_id")?;
                let name = args.require_str("name")?;
                let mut body = json!({ "name": name, "idBoard": board });
                if let Some(p) = args.str("position") {
                    body["pos"] = JsonValue::String(p);
                }
                c.send_json(Method::POST, "lists", &[], Some(&body), "create list").await?
            }
            "list_move" => {
                let list = segment(args, "list_id")?;
                let board = args.require_str("board_id")?;
                c.send_json(Method::PUT, &format!("lists/{list}/idBoard"), &[("value", board)], None, "move list")
                    .await?
            }
            "list_get_cards" => {
                let list = segment(args, "list_id")?;
                let limit = args.i64_or("limit", 50)?;
                let page = args.i64_or("page", 0)?;
                let q = [("limit", limit.to_string()), ("page", page.to_string())];
                c.get(&format!("lists/{list}/cards"), &q, "get list cards").await?
            }
            "list_archive_cards" => {
                let list = segment(args, "list_id")?;
                c.send_json(Method::POST, &format!("lists/{list}/archiveAllCards"), &[], None, "archive cards")
                    .await?
            }
            "card_create" => {
                let list = args.require_str("list_id")?;
                args.require_str("name")?;
                let mut body = body_of(args, &[("name", "name"), ("description", "desc")]);
                body["idList"] = JsonValue::String(list);
                c.send_json(Method::POST, "cards", &[], Some(&body), "create card").await?
            }
            "card_move" => {
                let card = segment(args, "card_id")?;
                let list = args.require_str("list_id")?;
                let mut body = json!({ "idList": list });
                if let Some(p) = args.str("position") {
                    body["pos"] = JsonValue::String(p);
                }
                c.send_json(Method::PUT, &format!("cards/{card}"), &[], Some(&body), "move card").await?
            }
            "card_get_members" => {
                let card = segment(args, "card_id")?;
                c.get(&format!("cards/{card}/members"), &[], "get card members").await?
            }
            "card_add_member" => {
                let card = segment(args, "card_id")?;
                let member = args.require_str("member_id")?;
                c.send_json(Method::POST, &format!("cards/{card}/idMembers"), &[("value", member)], None, "add card member")
                    .await?
            }
            "card_remove_member" => {
                let card = segment(args, "card_id")?;
                let member = segment(args, "member_id")?;
                c.delete(&format!("cards/{card}/idMembers/{member}"), "remove card member").await?;
                "Member removed successfully".to_string()
            }
            "card_get_comments" => {
                let card = segment(args, "card_id")?;
                c.get(&format!("cards/{card}/actions"), &[("filter", "commentCard".into())], "get card comments")
                    .await?
            }
            "card_add_comment" => {
                let card = segment(args, "card_id")?;
                let text = args.require_text("text")?;
                c.send_json(Method::POST, &format!("cards/{card}/actions/comments"), &[("text", text)], None, "add comment")
                    .await?
            }
            "label_create" => {
                let board = args.require_str("board_id")?;
                let name = args.require_str("name")?;
                let color = args.require_str("color")?.to_ascii_lowercase();
                if !LABEL_COLORS.contains(&color.as_str()) {
                    return Err(ServletError::invalid(format!(
                        "color must be one of: {}",
                        LABEL_COLORS.join(", ")
                    )));
                }
                let body = json!({ "name": name, "color": color, "idBoard": board });
                c.send_json(Method::POST, "labels", &[], Some(&body), "create label").await?
            }
            "label_delete" => {
                let label = segment(args, "label_id")?;
                c.delete(&format!("labels/{label}"), "delete label").await?;
                "Label deleted successfully".to_string()
            }
            "checklist_create" => {
                let card = args.require_str("card_id")?;
                let name = args.require_str("name")?;
                let body = json!({ "idCard": card, "name": name });
                c.send_json(Method::POST, "checklists", &[], Some(&body), "create checklist").await?
            }
            "checklist_add_item" => {
                let checklist = segment(args, "checklist_id")?;
                let name = args.require_str("name")?;
                let body = json!({ "name": name });
                c.send_json(Method::POST, &format!("checklists/{checklist}/checkItems"), &[], Some(&body), "add checklist item")
                    .await?
            }
            "comment_delete" => {
                let card = segment(args, "card_id")?;
                let action = segment(args, "action_id")?;
                c.delete(&format!("cards/{card}/actions/{action}/comments"), "delete comment").await?;
                "Comment deleted successfully".to_string()
            }
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        Ok(CallResult::text(out))
    }
}
