use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{execute, execute_read, join, parse, send, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_OAUTH_BASE: &str = "https://oauth2.googleapis.com";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    pub expires_in: i64,
    #[serde(default = "default_interval")]
    pub interval: i64,
}

fn default_interval() -> i64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
}

/// Outcome of one device-flow token poll.
#[derive(Debug, Clone)]
pub enum DevicePoll {
    /// `authorization_pending` or `slow_down`.
    Pending(String),
    Granted(TokenResponse),
}

/// Google OAuth endpoints for the device flow and refresh grant.
#[derive(Clone)]
pub struct OAuthClient {
    base: String,
    client_id: String,
    client_secret: String,
    http: Client,
}

impl OAuthClient {
    pub fn new(base: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: make_http_client(),
        }
    }

    pub async fn device_code(&self) -> Result<DeviceCode, ServletError> {
        let b = self
            .http
            .post(join(&self.base, "device/code"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", CALENDAR_SCOPE)]);
        let body = execute(b, "google-calendar.device_code", "device code request failed", Accept::Only(&[200])).await?;
        parse(&body, "failed to parse device code response")
    }

    pub async fn poll_device(&self, device_code: &str) -> Result<DevicePoll, ServletError> {
        let b = self.http.post(join(&self.base, "token")).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("device_code", device_code),
            ("grant_type", DEVICE_GRANT),
        ]);
        let resp = send(b, "google-calendar.token").await?;
        let status = resp.status();
        let body = resp.text().await?;
        if let Ok(TokenError { error }) = serde_json::from_str::<TokenError>(&body) {
            if error == "authorization_pending" || error == "slow_down" {
                return Ok(DevicePoll::Pending(error));
            }
            return Err(ServletError::upstream("token request failed", status.as_u16(), body));
        }
        if !status.is_success() {
            return Err(ServletError::upstream("token request failed", status.as_u16(), body));
        }
        Ok(DevicePoll::Granted(parse(&body, "failed to parse token response")?))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ServletError> {
        let b = self.http.post(join(&self.base, "token")).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);
        let body = execute(b, "google-calendar.refresh", "token refresh failed", Accept::Only(&[200])).await?;
        parse(&body, "failed to parse token response")
    }
}

/// Calendar v3 client for one user access token.
#[derive(Clone)]
pub struct CalendarClient {
    base: String,
    token: String,
    http: Client,
}

fn events_path(calendar_id: &str) -> String {
    format!("calendars/{}/events", urlencoding::encode(calendar_id))
}

impl CalendarClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base: base.into(), token: token.into(), http: make_http_client() }
    }

    fn req(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, join(&self.base, path)).bearer_auth(&self.token)
    }

    pub async fn list_events(&self, calendar_id: &str, query: &[(&str, String)]) -> Result<String, ServletError> {
        let path = events_path(calendar_id);
        execute_read(
            || self.req(Method::GET, &path).query(query),
            "google-calendar.list_events",
            "Calendar API error",
            Accept::Success,
        )
        .await
    }

    pub async fn create_event(&self, calendar_id: &str, event: &JsonValue) -> Result<String, ServletError> {
        let b = self.req(Method::POST, &events_path(calendar_id)).json(event);
        execute(b, "google-calendar.create_event", "Calendar API error", Accept::Success).await
    }

    /// PATCH so fields left out of `event` are kept.
    pub async fn update_event(&self, calendar_id: &str, event_id: &str, event: &JsonValue) -> Result<String, ServletError> {
        let path = format!("{}/{}", events_path(calendar_id), urlencoding::encode(event_id));
        let b = self.req(Method::PATCH, &path).json(event);
        execute(b, "google-calendar.update_event", "Calendar API error", Accept::Success).await
    }

    pub async fn list_calendars(&self) -> Result<String, ServletError> {
        execute_read(
            || self.req(Method::GET, "users/me/calendarList"),
            "google-calendar.list_calendars",
            "Calendar API error",
            Accept::Success,
        )
        .await
    }
}
