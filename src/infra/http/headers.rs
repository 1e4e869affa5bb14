use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Request;

/// Generate a simple request id suitable for logging/correlation.
pub fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("srv-{}-{}", now.as_secs(), now.subsec_nanos())
}

pub fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Add standard headers to an outgoing request and return the request id used.
/// A `User-Agent` already set by the caller is kept.
pub fn add_standard_headers(req: &mut Request, request_id: Option<String>) -> String {
    let rid = request_id.unwrap_or_else(generate_request_id);
    let headers = req.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&rid) {
        headers.insert("x-request-id", v);
    }
    if !headers.contains_key(USER_AGENT) {
        if let Ok(v) = HeaderValue::from_str(&user_agent()) {
            headers.insert(USER_AGENT, v);
        }
    }
    rid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_prefixed() {
        assert!(generate_request_id().starts_with("srv-"));
    }

    #[test]
    fn keeps_given_request_id_and_default_agent() {
        let client = reqwest::Client::new();
        let mut req = client.get("http://localhost/").build().unwrap();
        let rid = add_standard_headers(&mut req, Some("abc".into()));
        assert_eq!(rid, "abc");
        assert_eq!(req.headers()["x-request-id"], "abc");
        assert!(req.headers()["user-agent"].to_str().unwrap().starts_with("mcp-servlets/"));
    }

    #[test]
    fn keeps_caller_user_agent() {
        let client = reqwest::Client::new();
        let mut req = client
            .get("http://localhost/")
            .header(USER_AGENT, "github-mcpx-servlet")
            .build()
            .unwrap();
        add_standard_headers(&mut req, None);
        assert_eq!(req.headers()["user-agent"], "github-mcpx-servlet");
    }
}
