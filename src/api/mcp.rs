//! Plain JSON-RPC over HTTP POST, for callers that do not speak MCP sessions.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value as J};

use crate::core::mcp::{server_info, RpcReq, RpcResp, METHOD_NOT_FOUND};
use crate::core::ServletError;
use crate::infra::http::json as http_json;
use crate::servlets::Registry;

fn tools_list(reg: &Registry) -> J {
    json!({ "tools": reg.list() })
}

async fn call_tool(reg: &Registry, params: &J) -> Result<J, ServletError> {
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServletError::MissingArgument("name".into()))?;
    let args = params.get("arguments").unwrap_or(&J::Null);
    let result = reg.call(name, args).await?;
    Ok(serde_json::to_value(result)?)
}

/// Answer one decoded request.
pub async fn dispatch(reg: &Registry, req: RpcReq) -> RpcResp {
    let id = req.id.clone();
    match req.method.as_str() {
        "initialize" => http_json::ok(id, server_info()).0,
        "shutdown" => http_json::ok(id, J::Null).0,
        "tools.list" | "tools/list" => http_json::ok(id, tools_list(reg)).0,
        "tools.call" | "tools/call" => match call_tool(reg, &req.params).await {
            Ok(out) => http_json::ok(id, out).0,
            Err(e) => {
                tracing::warn!(error = %e, "tools.call rejected");
                http_json::from_servlet_error(id, e).0
            }
        },
        other => http_json::error(id, METHOD_NOT_FOUND, format!("unknown method: {other}")).0,
    }
}

// HTTP handler
pub async fn http(State(reg): State<Registry>, body: Bytes) -> (StatusCode, Json<RpcResp>) {
    let req: RpcReq = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "malformed JSON-RPC body");
            return (StatusCode::BAD_REQUEST, http_json::parse_error(format!("parse error: {e}")));
        }
    };
    tracing::debug!(method = %req.method, id = ?req.id, "rpc request");
    (StatusCode::OK, Json(dispatch(&reg, req).await))
}
