use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{execute, execute_read, join, parse, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://api.github.com";
const AGENT: &str = "github-mcpx-servlet";

/// GitHub REST v3 client authenticated with a personal token.
#[derive(Clone)]
pub struct GithubClient {
    base: String,
    token: String,
    http: Client,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct FileUpdate<'a> {
    pub message: &'a str,
    /// Base64 of the new file content.
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

fn repo_path(owner: &str, repo: &str, rest: &str) -> String {
    format!(
        "repos/{}/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(repo),
        rest.trim_start_matches('/')
    )
}

/// Encode each segment of a repository file path, keeping the slashes.
fn file_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl GithubClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base: base.into(), token: token.into(), http: make_http_client() }
    }

    fn req(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, join(&self.base, path))
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(USER_AGENT, AGENT)
    }

    pub async fn create_issue(&self, owner: &str, repo: &str, body: &JsonValue) -> Result<String, ServletError> {
        let b = self.req(Method::POST, &repo_path(owner, repo, "issues")).json(body);
        execute(b, "github.create-issue", "Failed to create issue", Accept::Only(&[201])).await
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: i64) -> Result<String, ServletError> {
        let path = repo_path(owner, repo, &format!("issues/{number}"));
        execute_read(|| self.req(Method::GET, &path), "github.get-issue", "Failed to get issue", Accept::Only(&[200])).await
    }

    pub async fn update_issue(&self, owner: &str, repo: &str, number: i64, body: &JsonValue) -> Result<String, ServletError> {
        let path = repo_path(owner, repo, &format!("issues/{number}"));
        let b = self.req(Method::PATCH, &path).json(body);
        execute(b, "github.update-issue", "Failed to update issue", Accept::Only(&[200])).await
    }

    pub async fn add_issue_comment(&self, owner: &str, repo: &str, number: i64, body: &str) -> Result<String, ServletError> {
        let path = repo_path(owner, repo, &format!("issues/{number}/comments"));
        let b = self.req(Method::POST, &path).json(&serde_json::json!({ "body": body }));
        execute(b, "github.add-issue-comment", "Failed to add comment", Accept::Only(&[201])).await
    }

    /// Raw contents API response: an object for files, an array for directories.
    pub async fn get_contents(&self, owner: &str, repo: &str, path: &str, branch: Option<&str>) -> Result<JsonValue, ServletError> {
        let url = repo_path(owner, repo, &format!("contents/{}", file_path(path)));
        let body = execute_read(
            || {
                let b = self.req(Method::GET, &url);
                match branch {
                    Some(r) => b.query(&[("ref", r)]),
                    None => b,
                }
            },
            "github.get-file-contents",
            "Failed to get file contents",
            Accept::Only(&[200]),
        )
        .await?;
        parse(&body, "Failed to get file contents")
    }

    /// Current blob sha of a file on `branch`, `None` when it does not exist yet.
    pub async fn file_sha(&self, owner: &str, repo: &str, path: &str, branch: &str) -> Result<Option<String>, ServletError> {
        match self.get_contents(owner, repo, path, Some(branch)).await {
            Ok(v) => Ok(serde_json::from_value::<ContentEntry>(v).ok().map(|e| e.sha)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn put_file(&self, owner: &str, repo: &str, path: &str, update: &FileUpdate<'_>) -> Result<String, ServletError> {
        let url = repo_path(owner, repo, &format!("contents/{}", file_path(path)));
        let b = self.req(Method::PUT, &url).json(update);
        execute(b, "github.create-or-update-file", "Failed to create or update file", Accept::Only(&[200, 201])).await
    }

    pub async fn branch_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String, ServletError> {
        let path = repo_path(owner, repo, &format!("git/ref/heads/{}", file_path(branch)));
        let body = execute_read(|| self.req(Method::GET, &path), "github.create-branch", "Failed to get source branch", Accept::Only(&[200])).await?;
        let r: GitRef = parse(&body, "Failed to get source branch")?;
        Ok(r.object.sha)
    }

    pub async fn create_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<String, ServletError> {
        let body = serde_json::json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        let b = self.req(Method::POST, &repo_path(owner, repo, "git/refs")).json(&body);
        execute(b, "github.create-branch", "Failed to create branch", Accept::Only(&[201])).await
    }

    pub async fn create_pull(&self, owner: &str, repo: &str, body: &JsonValue) -> Result<String, ServletError> {
        let b = self.req(Method::POST, &repo_path(owner, repo, "pulls")).json(body);
        execute(b, "github.create-pull-request", "Failed to create pull request", Accept::Only(&[201])).await
    }

    pub async fn list_commits(&self, owner: &str, repo: &str, query: &[(&str, String)]) -> Result<String, ServletError> {
        let path = repo_path(owner, repo, "commits");
        execute_read(|| self.req(Method::GET, &path).query(query), "github.list-commits", "Failed to list commits", Accept::Only(&[200])).await
    }

    pub async fn get_commit(&self, owner: &str, repo: &str, reference: &str, query: &[(&str, String)]) -> Result<String, ServletError> {
        let path = repo_path(owner, repo, &format!("commits/{}", urlencoding::encode(reference)));
        execute_read(|| self.req(Method::GET, &path).query(query), "github.get-commit", "Failed to get commit", Accept::Only(&[200])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn sends_token_and_fixed_agent() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octo/hello/issues/3")
                .header("authorization", "token secret")
                .header("accept", "application/vnd.github.v3+json")
                .header("user-agent", "github-mcpx-servlet");
            then.status(200).json_body(json!({"number": 3}));
        });
        let gh = GithubClient::new(server.base_url(), "secret");
        let out = gh.get_issue("octo", "hello", 3).await.unwrap();
        m.assert();
        assert!(out.contains("\"number\":3"));
    }

    #[tokio::test]
    async fn missing_file_has_no_sha() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/contents/docs/new.md").query_param("ref", "main");
            then.status(404).body("{\"message\":\"Not Found\"}");
        });
        let gh = GithubClient::new(server.base_url(), "t");
        assert_eq!(gh.file_sha("o", "r", "docs/new.md", "main").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reads_branch_sha() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/git/ref/heads/main");
            then.status(200).json_body(json!({"ref":"refs/heads/main","object":{"sha":"abc123","type":"commit"}}));
        });
        let gh = GithubClient::new(server.base_url(), "t");
        assert_eq!(gh.branch_sha("o", "r", "main").await.unwrap(), "abc123");
    }
}
