use std::sync::Arc;

use axum::body::{to_bytes, Body};
use hyper::Request;
use serde_json::{json, Value as J};
use tower::ServiceExt;

use mcp_servlets::infra::config::ServletConfig;
use mcp_servlets::infra::http_app::build_app_with_rpc;
use mcp_servlets::servlets::bluesky::BlueskyServlet;
use mcp_servlets::servlets::crypto::CryptoServlet;
use mcp_servlets::servlets::github::GithubServlet;
use mcp_servlets::servlets::onedrive::OnedriveServlet;
use mcp_servlets::servlets::Registry;

const BODY_LIMIT: usize = 1024 * 1024;

async fn rpc(app: &axum::Router, body: J) -> J {
    let req = Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert!(resp.status().is_success());
    let bytes = to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn http_e2e_github_call_through_registry() {
    let server = httpmock::MockServer::start();
    let issue = server.mock(|when, then| {
        when.method(httpmock::Method::GET)
            .path("/repos/octo/hello/issues/7")
            .header("authorization", "token ghp_test");
        then.status(200).json_body(json!({"number": 7, "title": "Broken build"}));
    });

    let github = GithubServlet::new(ServletConfig::from_pairs(
        "github",
        [("api-key", "ghp_test"), ("base-url", server.base_url().as_str())],
    ));
    let app = build_app_with_rpc(Registry::new(vec![Arc::new(CryptoServlet), Arc::new(github)]));

    let v = rpc(
        &app,
        json!({"jsonrpc":"2.0","id":1,"method":"tools/call",
               "params":{"name":"get-issue","arguments":{"owner":"octo","repo":"hello","issue":7}}}),
    )
    .await;
    issue.assert();
    assert_eq!(v["result"]["isError"], false);
    let text = v["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Broken build"));
}

#[tokio::test]
async fn http_e2e_upstream_failure_is_error_result() {
    let server = httpmock::MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/repos/octo/hello/issues/8");
        then.status(404).body("{\"message\":\"Not Found\"}");
    });
    let github = GithubServlet::new(ServletConfig::from_pairs(
        "github",
        [("api-key", "ghp_test"), ("base-url", server.base_url().as_str())],
    ));
    let app = build_app_with_rpc(Registry::new(vec![Arc::new(github)]));
    let v = rpc(
        &app,
        json!({"jsonrpc":"2.0","id":2,"method":"tools.call",
               "params":{"name":"get-issue","arguments":{"owner":"octo","repo":"hello","issue":8}}}),
    )
    .await;
    assert_eq!(v["result"]["isError"], true);
    assert!(v["result"]["content"][0]["text"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn http_e2e_shared_tool_names_are_qualified() {
    let app = build_app_with_rpc(Registry::new(vec![
        Arc::new(BlueskyServlet::new(ServletConfig::from_pairs("bluesky", [("handle", "")]))),
        Arc::new(OnedriveServlet::new(ServletConfig::from_pairs("onedrive", [("oauth-token", "")]))),
    ]));
    let v = rpc(&app, json!({"jsonrpc":"2.0","id":3,"method":"tools/list"})).await;
    let names: Vec<&str> = v["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"bluesky.search"));
    assert!(names.contains(&"onedrive.search"));
    assert!(!names.contains(&"search"));
    assert!(names.contains(&"get-thread"));

    // qualified names route; with no token configured the call is an error result
    let v = rpc(
        &app,
        json!({"jsonrpc":"2.0","id":4,"method":"tools/call",
               "params":{"name":"onedrive.search","arguments":{"query":"budget"}}}),
    )
    .await;
    assert_eq!(v["result"]["isError"], true);
    assert_eq!(v["result"]["content"][0]["text"], "missing configuration: oauth-token");
}
