use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value as JsonValue;

use super::{execute, execute_read, join, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Largest page Microsoft Graph accepts for `$top`.
pub const MAX_TOP: u64 = 999;

/// `me/drive` or `drives/{id}`, followed by `path` when given.
pub fn drive_path(drive_id: Option<&str>, path: &str) -> String {
    let root = match drive_id {
        Some(id) => format!("drives/{}", urlencoding::encode(id)),
        None => "me/drive".to_string(),
    };
    if path.is_empty() {
        root
    } else {
        format!("{root}/{path}")
    }
}

/// Microsoft Graph drive client. `action` completes the `Failed to {action}` text.
#[derive(Clone)]
pub struct OneDriveClient {
    base: String,
    token: String,
    http: Client,
}

impl OneDriveClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base: base.into(), token: token.into(), http: make_http_client() }
    }

    fn metric(path: &str) -> String {
        let head = path.split(['/', '(', ':']).filter(|s| !s.is_empty()).last().unwrap_or("root");
        format!("onedrive.{head}")
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)], action: &str) -> Result<String, ServletError> {
        let url = join(&self.base, path);
        execute_read(
            || self.http.get(&url).bearer_auth(&self.token).header(ACCEPT, "application/json").query(query),
            &Self::metric(path),
            &format!("Failed to {action}"),
            Accept::Only(&[200]),
        )
        .await
    }

    pub async fn post(&self, path: &str, body: &JsonValue, action: &str) -> Result<String, ServletError> {
        let b = self
            .http
            .post(join(&self.base, path))
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .json(body);
        execute(b, &Self::metric(path), &format!("Failed to {action}"), Accept::Only(&[201])).await
    }

    pub async fn put_content(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: &str,
        action: &str,
    ) -> Result<String, ServletError> {
        let b = self
            .http
            .put(join(&self.base, path))
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type)
            .body(content);
        execute(b, "onedrive.content", &format!("Failed to {action}"), Accept::Only(&[200, 201])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn drive_paths() {
        assert_eq!(drive_path(None, "root/children"), "me/drive/root/children");
        assert_eq!(drive_path(Some("b!x"), "recent"), "drives/b%21x/recent");
        assert_eq!(drive_path(None, ""), "me/drive");
    }

    #[test]
    fn metric_names_follow_last_segment() {
        assert_eq!(OneDriveClient::metric("me/drive/root/children"), "onedrive.children");
        assert_eq!(OneDriveClient::metric("me/drives"), "onedrive.drives");
    }

    #[tokio::test]
    async fn create_expects_201() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/me/drive/root/children").header("authorization", "Bearer t");
            then.status(200).body("{}");
        });
        let err = OneDriveClient::new(server.base_url(), "t")
            .post("me/drive/root/children", &serde_json::json!({}), "create folder")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to create folder: 200 {}");
    }

    #[tokio::test]
    async fn upload_accepts_200_and_201() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(PUT)
                .path("/me/drive/root:/a.txt:/content")
                .header("content-type", "text/plain")
                .body("hello");
            then.status(201).body("{\"id\":\"1\"}");
        });
        let out = OneDriveClient::new(server.base_url(), "t")
            .put_content("me/drive/root:/a.txt:/content", b"hello".to_vec(), "text/plain", "upload file")
            .await
            .unwrap();
        m.assert();
        assert_eq!(out, "{\"id\":\"1\"}");
    }
}
