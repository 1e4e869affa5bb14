//! Google Calendar with device-flow login.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value as JsonValue};

use super::schema;
use crate::clients::calendar::{CalendarClient, DevicePoll, OAuthClient, DEFAULT_API_BASE, DEFAULT_OAUTH_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

const NEEDS_LOGIN: &str = "access_token is required. Call login-initiate and login-complete first";
const PENDING: &str = "authorization_pending: user has not yet completed authorization";

pub struct CalendarServlet {
    config: ServletConfig,
}

impl CalendarServlet {
    pub const NAME: &'static str = "google-calendar";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }

    fn oauth(&self) -> Result<OAuthClient, ServletError> {
        Ok(OAuthClient::new(
            self.config.base_url("oauth-url", DEFAULT_OAUTH_BASE),
            self.config.require("client-id")?,
            self.config.require("client-secret")?,
        ))
    }

    fn calendar(&self, args: &Args) -> Result<CalendarClient, ServletError> {
        let token = args.str("access_token").ok_or_else(|| ServletError::Message(NEEDS_LOGIN.into()))?;
        Ok(CalendarClient::new(self.config.base_url("api-url", DEFAULT_API_BASE), token))
    }
}

/// Event body from whichever of the event fields are present.
fn event_body(args: &Args) -> Result<JsonValue, ServletError> {
    let mut e = Map::new();
    for key in ["summary", "description", "location"] {
        if let Some(v) = args.text(key) {
            e.insert(key.into(), JsonValue::String(v));
        }
    }
    if let Some(start) = args.str("start_time") {
        e.insert("start".into(), json!({ "dateTime": start }));
    }
    if let Some(end) = args.str("end_time") {
        e.insert("end".into(), json!({ "dateTime": end }));
    }
    let attendees = args.str_list("attendees")?;
    if !attendees.is_empty() {
        let list: Vec<JsonValue> = attendees.into_iter().map(|email| json!({ "email": email })).collect();
        e.insert("attendees".into(), JsonValue::Array(list));
    }
    Ok(JsonValue::Object(e))
}

fn token_prop() -> JsonValue {
    json!({ "type": "string", "description": "OAuth access token from login-complete" })
}

fn event_props(extra: JsonValue) -> JsonValue {
    let mut props = json!({
        "access_token": token_prop(),
        "calendar_id": { "type": "string", "default": "primary" },
        "summary": { "type": "string" },
        "description": { "type": "string" },
        "location": { "type": "string" },
        "start_time": { "type": "string", "description": "RFC 3339 start, e.g. 2025-03-01T10:00:00Z" },
        "end_time": { "type": "string", "description": "RFC 3339 end" },
        "attendees": { "type": "array", "items": { "type": "string" }, "description": "Attendee emails" }
    });
    if let (Some(p), JsonValue::Object(e)) = (props.as_object_mut(), extra) {
        p.extend(e);
    }
    props
}

#[async_trait]
impl Servlet for CalendarServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "login-initiate",
                "Start the Google Calendar OAuth2 device flow; show the user code and URL to the user",
                schema(json!({}), &[]),
            ),
            ToolDescription::new(
                "login-complete",
                "Complete the device flow once the user approved and get an access token",
                schema(
                    json!({ "device_code": { "type": "string", "description": "Device code from login-initiate" } }),
                    &["device_code"],
                ),
            ),
            ToolDescription::new(
                "refresh-token",
                "Exchange a refresh token for a new access token",
                schema(json!({ "refresh_token": { "type": "string" } }), &["refresh_token"]),
            ),
            ToolDescription::new(
                "list_events",
                "List upcoming events of a calendar",
                schema(
                    json!({
                        "access_token": token_prop(),
                        "calendar_id": { "type": "string", "default": "primary" },
                        "max_results": { "type": "integer", "default": 10 },
                        "time_min": { "type": "string", "description": "RFC 3339 lower bound, default now" },
                        "time_max": { "type": "string", "description": "RFC 3339 upper bound" }
                    }),
                    &["access_token"],
                ),
            ),
            ToolDescription::new(
                "create_event",
                "Create an event",
                schema(event_props(json!({})), &["access_token", "summary", "start_time", "end_time"]),
            ),
            ToolDescription::new(
                "update_event",
                "Update fields of an existing event",
                schema(event_props(json!({ "event_id": { "type": "string" } })), &["access_token", "event_id"]),
            ),
            ToolDescription::new(
                "list_calendars",
                "List the user's calendars",
                schema(json!({ "access_token": token_prop() }), &["access_token"]),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        match tool {
            "login-initiate" => {
                let code = self.oauth()?.device_code().await?;
                tracing::info!(verification_url = %code.verification_url, "device flow started");
                Ok(CallResult::json(&serde_json::to_value(&code)?))
            }
            "login-complete" => {
                let device_code = args.require_str("device_code")?;
                match self.oauth()?.poll_device(&device_code).await? {
                    DevicePoll::Pending(reason) => {
                        tracing::debug!(%reason, "device flow still pending");
                        Err(ServletError::Message(PENDING.into()))
                    }
                    DevicePoll::Granted(token) => Ok(CallResult::json(&serde_json::to_value(&token)?)),
                }
            }
            "refresh-token" => {
                let refresh = args.require_str("refresh_token")?;
                let token = self.oauth()?.refresh(&refresh).await?;
                Ok(CallResult::json(&serde_json::to_value(&token)?))
            }
            "list_events" => {
                let cal = self.calendar(args)?;
                let calendar_id = args.str("calendar_id").unwrap_or_else(|| "primary".into());
                let time_min = args
                    .str("time_min")
                    .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
                let mut q = vec![
                    ("maxResults", args.i64_or("max_results", 10)?.to_string()),
                    ("timeMin", time_min),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                ];
                if let Some(max) = args.str("time_max") {
                    q.push(("timeMax", max));
                }
                Ok(CallResult::text(cal.list_events(&calendar_id, &q).await?))
            }
            "create_event" => {
                let cal = self.calendar(args)?;
                args.require_text("summary")?;
                args.require_str("start_time")?;
                args.require_str("end_time")?;
                let calendar_id = args.str("calendar_id").unwrap_or_else(|| "primary".into());
                Ok(CallResult::text(cal.create_event(&calendar_id, &event_body(args)?).await?))
            }
            "update_event" => {
                let cal = self.calendar(args)?;
                let event_id = args.require_str("event_id")?;
                let calendar_id = args.str("calendar_id").unwrap_or_else(|| "primary".into());
                Ok(CallResult::text(cal.update_event(&calendar_id, &event_id, &event_body(args)?).await?))
            }
            "list_calendars" => Ok(CallResult::text(self.calendar(args)?.list_calendars().await?)),
            other => Err(ServletError::UnknownTool(other.to_string())),
        }
    }
}
