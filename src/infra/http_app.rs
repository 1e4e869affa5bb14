use axum::{
    routing::{any_service, get, post},
    Router,
};
use std::sync::Arc;

use crate::infra::mcp::ServletsSvc;
use crate::infra::runtime::mcp_transport::{make_streamable_http_service, LocalSessionManager};
use crate::servlets::Registry;

fn mcp_routes(registry: Registry) -> Router {
    let session_mgr = Arc::new(LocalSessionManager::default());
    let mcp_service =
        make_streamable_http_service(move || ServletsSvc::new(registry.clone()), session_mgr);

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route_service("/mcp", any_service(mcp_service))
}

/// `/healthz` + streamable MCP at `/mcp`.
pub fn build_app_default(registry: Registry) -> Router {
    mcp_routes(registry)
}

/// Default app **plus** the plain JSON-RPC shim at `/rpc`.
pub fn build_app_with_rpc(registry: Registry) -> Router {
    let rpc = Router::new()
        .route("/rpc", post(crate::api::mcp::http))
        .with_state(registry.clone());
    mcp_routes(registry).merge(rpc)
}
