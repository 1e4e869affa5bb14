use std::sync::Arc;

use http_body_util::BodyExt; // for .collect
use hyper::{header, Request, StatusCode};
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use tower::ServiceExt; // for .oneshot

use mcp_servlets::infra::http_app::build_app_default;
use mcp_servlets::servlets::crypto::CryptoServlet;
use mcp_servlets::servlets::Registry;

static MCP_PROTOCOL_VERSION: &str = "2025-03-26";

fn post(body: Value, session: Option<&str>) -> Request<axum::body::Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .header(header::CONTENT_TYPE, "application/json")
        .header("MCP-Protocol-Version", MCP_PROTOCOL_VERSION);
    if let Some(id) = session {
        b = b.header("MCP-Session-Id", id);
    }
    b.body(axum::body::Body::from(body.to_string())).unwrap()
}

/// First JSON-RPC message carried in an SSE `data:` line.
async fn sse_message(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let s = String::from_utf8_lossy(&bytes);
    s.lines()
        .filter_map(|line| line.strip_prefix("data:").map(str::trim))
        .find_map(|d| serde_json::from_str::<Value>(d).ok())
        .expect("no JSON-RPC message in the event stream")
}

#[tokio::test]
async fn initialize_list_and_call_over_streamable_http() {
    let app = build_app_default(Registry::new(vec![Arc::new(CryptoServlet)]));

    // initialize
    let init = json!({
        "jsonrpc":"2.0","id":1,"method":"initialize",
        "params":{ "protocolVersion":MCP_PROTOCOL_VERSION,"capabilities":{},"clientInfo":{"name":"test","version":"0.1"} }
    });
    let init_res = app.clone().oneshot(post(init, None)).await.unwrap();
    assert!(init_res.status().is_success());
    let session_id = init_res
        .headers()
        .get("MCP-Session-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    let init_msg = sse_message(init_res).await;
    assert!(init_msg["result"]["capabilities"]["tools"].is_object());

    // notifications/initialized
    let notif = json!({"jsonrpc":"2.0","method":"notifications/initialized","params":{}});
    let notif_res = app.clone().oneshot(post(notif, Some(&session_id))).await.unwrap();
    assert_eq!(notif_res.status(), StatusCode::ACCEPTED);

    // tools/list
    let list = json!({"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}});
    let list_res = timeout(Duration::from_secs(20), app.clone().oneshot(post(list, Some(&session_id))))
        .await
        .unwrap()
        .unwrap();
    assert!(list_res.status().is_success());
    let listed = sse_message(list_res).await;
    let names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"sha256"));
    assert!(names.contains(&"bcrypt"));

    // tools/call
    let call = json!({
        "jsonrpc":"2.0","id":3,"method":"tools/call",
        "params": {"name":"sha256","arguments":{"text":"abc"}}
    });
    let call_res = app.clone().oneshot(post(call, Some(&session_id))).await.unwrap();
    assert!(call_res.status().is_success());
    let v = sse_message(call_res).await;
    assert_eq!(v["id"], 3);
    assert_eq!(
        v["result"]["content"][0]["text"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_ne!(v["result"]["isError"], true);

    // a servlet failure stays a tool result
    let bad = json!({
        "jsonrpc":"2.0","id":4,"method":"tools/call",
        "params": {"name":"sha256","arguments":{}}
    });
    let bad_res = app.clone().oneshot(post(bad, Some(&session_id))).await.unwrap();
    let v = sse_message(bad_res).await;
    assert_eq!(v["result"]["isError"], true);
    assert_eq!(v["result"]["content"][0]["text"], "missing required argument: text");
}
