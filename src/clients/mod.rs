//! Typed HTTP clients, one per upstream API, plus the shared send/check helpers.

use std::time::Instant;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::core::error::ServletError;
use crate::infra::http::headers::add_standard_headers;
use crate::infra::logging::log_metric;
use crate::infra::runtime::limits::retry_async;

pub mod amadeus;
pub mod assemblyai;
pub mod atproto;
pub mod brave;
pub mod calendar;
pub mod github;
pub mod maps;
pub mod onedrive;
pub mod tenor;
pub mod trello;
pub mod wordpress;

/// Retries for idempotent reads that hit a 5xx or a transport error.
pub const READ_RETRIES: u32 = 1;

/// Which statuses count as success for a call.
#[derive(Debug, Clone, Copy)]
pub enum Accept {
    Success,
    Only(&'static [u16]),
}

impl Accept {
    pub fn allows(&self, status: StatusCode) -> bool {
        match self {
            Accept::Success => status.is_success(),
            Accept::Only(codes) => codes.contains(&status.as_u16()),
        }
    }
}

/// Send with standard headers, recording latency and transport errors under `tool`.
pub async fn send(builder: RequestBuilder, tool: &str) -> Result<Response, ServletError> {
    let (client, req) = builder.build_split();
    let mut req = req?;
    let rid = add_standard_headers(&mut req, None);
    let start = Instant::now();
    match client.execute(req).await {
        Ok(resp) => {
            log_metric(tool, "remote_latency_ms", start.elapsed().as_millis() as f64);
            tracing::debug!(tool, request_id = %rid, status = resp.status().as_u16(), "upstream response");
            Ok(resp)
        }
        Err(e) => {
            log_metric(tool, "remote_error_total", 1.0);
            tracing::warn!(tool, request_id = %rid, error = %e, "upstream request failed");
            Err(e.into())
        }
    }
}

/// Read the body, mapping statuses outside `accept` to `Upstream { context, .. }`.
pub async fn read_text(resp: Response, context: &str, accept: Accept) -> Result<String, ServletError> {
    let status = resp.status();
    let body = resp.text().await?;
    if accept.allows(status) {
        Ok(body)
    } else {
        Err(ServletError::upstream(context, status.as_u16(), body))
    }
}

/// Pass `resp` through when `accept` allows its status. Otherwise the body becomes
/// `Upstream { context, .. }` and the failure is counted under `tool`.
pub async fn check_status(resp: Response, tool: &str, context: &str, accept: Accept) -> Result<Response, ServletError> {
    let status = resp.status();
    if accept.allows(status) {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(upstream_failure(tool, context, status.as_u16(), body))
}

fn upstream_failure(tool: &str, context: &str, status: u16, body: String) -> ServletError {
    log_metric(tool, "remote_error_total", 1.0);
    tracing::warn!(tool, status, "upstream rejected request");
    ServletError::upstream(context, status, body)
}

pub async fn execute(
    builder: RequestBuilder,
    tool: &str,
    context: &str,
    accept: Accept,
) -> Result<String, ServletError> {
    let resp = send(builder, tool).await?;
    let out = read_text(resp, context, accept).await;
    if out.is_err() {
        log_metric(tool, "remote_error_total", 1.0);
    }
    out
}

/// Like [`execute`] for GETs: rebuilds and retries on 5xx or transport failure.
pub async fn execute_read<F>(
    make: F,
    tool: &str,
    context: &str,
    accept: Accept,
) -> Result<String, ServletError>
where
    F: Fn() -> RequestBuilder,
{
    let outcome = retry_async(READ_RETRIES, |attempt| {
        let builder = make();
        async move {
            if attempt > 0 {
                tracing::debug!(tool, attempt, "retrying upstream read");
            }
            match execute(builder, tool, context, accept).await {
                Err(e) if is_retryable(&e) => Err(e),
                other => Ok(other),
            }
        }
    })
    .await;
    outcome.and_then(|r| r)
}

fn is_retryable(e: &ServletError) -> bool {
    match e {
        ServletError::Upstream { status, .. } => *status >= 500,
        ServletError::Http(err) => err.is_timeout() || err.is_connect(),
        _ => false,
    }
}

pub fn parse<T: DeserializeOwned>(body: &str, context: &str) -> Result<T, ServletError> {
    serde_json::from_str(body).map_err(|e| ServletError::Decode(format!("{context}: invalid response: {e}")))
}

/// Join a base URL and a path without doubling slashes.
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
