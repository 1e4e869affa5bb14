use axum::Json;

use crate::core::error::ServletError;
use crate::core::mcp::{err as rpc_err, ok as rpc_ok, RpcResp, APPLICATION_ERROR, PARSE_ERROR};

pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Json<RpcResp> {
    Json(rpc_ok(id, result))
}

pub fn error(id: serde_json::Value, code: i32, message: impl Into<String>) -> Json<RpcResp> {
    Json(rpc_err(id, code, message, None))
}

pub fn parse_error(message: impl Into<String>) -> Json<RpcResp> {
    Json(rpc_err(serde_json::Value::Null, PARSE_ERROR, message, None))
}

/// Map a ServletError into a JSON-RPC error response (-32000 application error)
pub fn from_servlet_error(id: serde_json::Value, err: ServletError) -> Json<RpcResp> {
    error(id, APPLICATION_ERROR, err.to_string())
}
