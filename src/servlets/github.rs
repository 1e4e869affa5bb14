//! GitHub issues, files, branches, pull requests and commits.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value as JsonValue};

use super::schema;
use crate::clients::github::{FileUpdate, GithubClient, DEFAULT_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

pub struct GithubServlet {
    config: ServletConfig,
}

impl GithubServlet {
    pub const NAME: &'static str = "github";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> Result<GithubClient, ServletError> {
        Ok(GithubClient::new(
            self.config.base_url("base-url", DEFAULT_BASE),
            self.config.require("api-key")?,
        ))
    }
}

fn owner_repo() -> JsonValue {
    json!({
        "owner": { "type": "string", "description": "Repository owner (user or organization)" },
        "repo": { "type": "string", "description": "Repository name" }
    })
}

fn with_owner_repo(extra: JsonValue) -> JsonValue {
    let mut props = owner_repo();
    if let (Some(p), JsonValue::Object(e)) = (props.as_object_mut(), extra) {
        p.extend(e);
    }
    props
}

/// Optional issue fields shared by create and update.
fn issue_fields(args: &Args, body: &mut Map<String, JsonValue>) -> Result<(), ServletError> {
    for key in ["title", "body", "state"] {
        if let Some(v) = args.text(key) {
            body.insert(key.into(), JsonValue::String(v));
        }
    }
    for key in ["assignees", "labels"] {
        let list = args.str_list(key)?;
        if !list.is_empty() {
            body.insert(key.into(), json!(list));
        }
    }
    if let Some(m) = args.i64("milestone")? {
        body.insert("milestone".into(), json!(m));
    }
    Ok(())
}

/// Decode a contents API file object; directories are returned as listed.
fn render_contents(v: JsonValue) -> Result<CallResult, ServletError> {
    if v.is_array() {
        return Ok(CallResult::json(&v));
    }
    match (v.get("encoding").and_then(|e| e.as_str()), v.get("content").and_then(|c| c.as_str())) {
        (Some("base64"), Some(content)) => {
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(cleaned)
                .map_err(|e| ServletError::Decode(format!("invalid base64 content: {e}")))?;
            Ok(CallResult::text(String::from_utf8_lossy(&bytes).into_owned()))
        }
        _ => Ok(CallResult::json(&v)),
    }
}

impl GithubServlet {
    #[allow(clippy::too_many_arguments)]
    async fn put_file(
        &self,
        gh: &GithubClient,
        owner: &str,
        repo: &str,
        branch: &str,
        message: &str,
        path: &str,
        content: &str,
        sha: Option<String>,
    ) -> Result<String, ServletError> {
        let sha = match sha {
            Some(s) => Some(s),
            None => gh.file_sha(owner, repo, path, branch).await?,
        };
        let update = FileUpdate {
            message,
            content: STANDARD.encode(content.as_bytes()),
            branch,
            sha,
        };
        gh.put_file(owner, repo, path, &update).await
    }
}

/// Every tool takes `owner` and `repo`.
const TOOLS: &[&str] = &[
    "create-issue",
    "get-issue",
    "update-issue",
    "add-issue-comment",
    "get-file-contents",
    "create-or-update-file",
    "push-files",
    "create-branch",
    "create-pull-request",
    "gh-list-commits",
    "gh-get-commit",
];

#[async_trait]
impl Servlet for GithubServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "create-issue",
                "Create an issue in a GitHub repository",
                schema(
                    with_owner_repo(json!({
                        "title": { "type": "string" },
                        "body": { "type": "string" },
                        "assignees": { "type": "array", "items": { "type": "string" } },
                        "milestone": { "type": "number" },
                        "labels": { "type": "array", "items": { "type": "string" } }
                    })),
                    &["owner", "repo", "title", "body"],
                ),
            ),
            ToolDescription::new(
                "get-issue",
                "Get an issue from a GitHub repository",
                schema(with_owner_repo(json!({ "issue": { "type": "number" } })), &["owner", "repo", "issue"]),
            ),
            ToolDescription::new(
                "update-issue",
                "Update an issue's title, body, state, assignees, milestone or labels",
                schema(
                    with_owner_repo(json!({
                        "issue": { "type": "number" },
                        "title": { "type": "string" },
                        "body": { "type": "string" },
                        "state": { "type": "string", "enum": ["open", "closed"] },
                        "assignees": { "type": "array", "items": { "type": "string" } },
                        "milestone": { "type": "number" },
                        "labels": { "type": "array", "items": { "type": "string" } }
                    })),
                    &["owner", "repo", "issue"],
                ),
            ),
            ToolDescription::new(
                "add-issue-comment",
                "Add a comment to an issue",
                schema(
                    with_owner_repo(json!({ "issue": { "type": "number" }, "body": { "type": "string" } })),
                    &["owner", "repo", "issue", "body"],
                ),
            ),
            ToolDescription::new(
                "get-file-contents",
                "Get the contents of a file or directory. File content is returned decoded.",
                schema(
                    with_owner_repo(json!({
                        "path": { "type": "string" },
                        "branch": { "type": "string", "description": "Branch, tag or commit; defaults to the repository default branch" }
                    })),
                    &["owner", "repo", "path"],
                ),
            ),
            ToolDescription::new(
                "create-or-update-file",
                "Create or update a single file. The current sha is looked up when not given.",
                schema(
                    with_owner_repo(json!({
                        "path": { "type": "string" },
                        "content": { "type": "string" },
                        "message": { "type": "string", "description": "Commit message" },
                        "branch": { "type": "string" },
                        "sha": { "type": "string", "description": "Blob sha of the file being replaced" }
                    })),
                    &["owner", "repo", "path", "content", "message", "branch"],
                ),
            ),
            ToolDescription::new(
                "push-files",
                "Commit several files to a branch, one after another",
                schema(
                    with_owner_repo(json!({
                        "branch": { "type": "string" },
                        "message": { "type": "string" },
                        "files": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": { "path": { "type": "string" }, "content": { "type": "string" } },
                                "required": ["path", "content"]
                            }
                        }
                    })),
                    &["owner", "repo", "branch", "message", "files"],
                ),
            ),
            ToolDescription::new(
                "create-branch",
                "Create a branch from another branch (default main)",
                schema(
                    with_owner_repo(json!({
                        "branch": { "type": "string" },
                        "from_branch": { "type": "string", "default": "main" }
                    })),
                    &["owner", "repo", "branch"],
                ),
            ),
            ToolDescription::new(
                "create-pull-request",
                "Open a pull request",
                schema(
                    with_owner_repo(json!({
                        "title": { "type": "string" },
                        "body": { "type": "string" },
                        "head": { "type": "string", "description": "Branch with the changes" },
                        "base": { "type": "string", "description": "Branch to merge into" },
                        "draft": { "type": "boolean" },
                        "maintainer_can_modify": { "type": "boolean" }
                    })),
                    &["owner", "repo", "title", "head", "base"],
                ),
            ),
            ToolDescription::new(
                "gh-list-commits",
                "List commits of a repository",
                schema(
                    with_owner_repo(json!({
                        "sha": { "type": "string", "description": "Branch or sha to start from" },
                        "path": { "type": "string" },
                        "author": { "type": "string" },
                        "committer": { "type": "string" },
                        "since": { "type": "string", "description": "ISO 8601 timestamp" },
                        "until": { "type": "string", "description": "ISO 8601 timestamp" },
                        "per_page": { "type": "number" },
                        "page": { "type": "number" }
                    })),
                    &["owner", "repo"],
                ),
            ),
            ToolDescription::new(
                "gh-get-commit",
                "Get a single commit with its files",
                schema(
                    with_owner_repo(json!({
                        "ref": { "type": "string", "description": "Commit sha, branch or tag" },
                        "per_page": { "type": "number" },
                        "page": { "type": "number" }
                    })),
                    &["owner", "repo", "ref"],
                ),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        if !TOOLS.contains(&tool) {
            return Err(ServletError::UnknownTool(tool.to_string()));
        }
        let gh = self.client()?;
        let owner = args.require_str("owner")?;
        let repo = args.require_str("repo")?;

        match tool {
            "create-issue" => {
                args.require_text("title")?;
                args.require_text("body")?;
                let mut body = Map::new();
                issue_fields(args, &mut body)?;
                body.remove("state");
                Ok(CallResult::text(gh.create_issue(&owner, &repo, &JsonValue::Object(body)).await?))
            }
            "get-issue" => {
                let n = args.require_i64("issue")?;
                Ok(CallResult::text(gh.get_issue(&owner, &repo, n).await?))
            }
            "update-issue" => {
                let n = args.require_i64("issue")?;
                let mut body = Map::new();
                issue_fields(args, &mut body)?;
                Ok(CallResult::text(gh.update_issue(&owner, &repo, n, &JsonValue::Object(body)).await?))
            }
            "add-issue-comment" => {
                let n = args.require_i64("issue")?;
                let body = args.require_text("body")?;
                Ok(CallResult::text(gh.add_issue_comment(&owner, &repo, n, &body).await?))
            }
            "get-file-contents" => {
                let path = args.require_str("path")?;
                let branch = args.str("branch");
                render_contents(gh.get_contents(&owner, &repo, &path, branch.as_deref()).await?)
            }
            "create-or-update-file" => {
                let path = args.require_str("path")?;
                let content = args.require_text("content")?;
                let message = args.require_text("message")?;
                let branch = args.require_str("branch")?;
                let out = self
                    .put_file(&gh, &owner, &repo, &branch, &message, &path, &content, args.str("sha"))
                    .await?;
                Ok(CallResult::text(out))
            }
            "push-files" => {
                let branch = args.require_str("branch")?;
                let message = args.require_text("message")?;
                let files = args.array("files")?;
                if files.is_empty() {
                    return Err(ServletError::MissingArgument("files".into()));
                }
                let mut pushed = Vec::with_capacity(files.len());
                for f in &files {
                    let file = Args::from_value(f)?;
                    let path = file.require_str("path")?;
                    let content = file.require_text("content")?;
                    self.put_file(&gh, &owner, &repo, &branch, &message, &path, &content, None)
                        .await?;
                    pushed.push(path);
                }
                Ok(CallResult::json(&json!({ "branch": branch, "files": pushed })))
            }
            "create-branch" => {
                let branch = args.require_str("branch")?;
                let from = args.str("from_branch").unwrap_or_else(|| "main".into());
                let sha = gh.branch_sha(&owner, &repo, &from).await?;
                Ok(CallResult::text(gh.create_ref(&owner, &repo, &branch, &sha).await?))
            }
            "create-pull-request" => {
                let mut body = Map::new();
                for key in ["title", "head", "base"] {
                    body.insert(key.into(), JsonValue::String(args.require_str(key)?));
                }
                if let Some(b) = args.text("body") {
                    body.insert("body".into(), JsonValue::String(b));
                }
                for key in ["draft", "maintainer_can_modify"] {
                    if let Some(b) = args.bool(key)? {
                        body.insert(key.into(), JsonValue::Bool(b));
                    }
                }
                Ok(CallResult::text(gh.create_pull(&owner, &repo, &JsonValue::Object(body)).await?))
            }
            "gh-list-commits" => {
                let mut query = Vec::new();
                for key in ["sha", "path", "author", "committer", "since", "until", "per_page", "page"] {
                    if let Some(v) = args.str(key) {
                        query.push((key, v));
                    }
                }
                Ok(CallResult::text(gh.list_commits(&owner, &repo, &query).await?))
            }
            "gh-get-commit" => {
                let reference = args.require_str("ref")?;
                let mut query = Vec::new();
                for key in ["per_page", "page"] {
                    if let Some(v) = args.str(key) {
                        query.push((key, v));
                    }
                }
                Ok(CallResult::text(gh.get_commit(&owner, &repo, &reference, &query).await?))
            }
            other => Err(ServletError::UnknownTool(other.to_string())),
        }
    }
}
