//! JSON-RPC envelope used by the plain HTTP shim and the CLI.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as J};

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const APPLICATION_ERROR: i32 = -32000;

#[derive(Deserialize, Debug)]
pub struct RpcReq {
    #[allow(dead_code)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: J,
    pub method: String,
    #[serde(default)]
    pub params: J,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResp {
    pub jsonrpc: String,
    pub id: J,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<J>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErr>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcErr {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<J>,
}

pub fn ok(id: J, result: J) -> RpcResp {
    RpcResp { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
}

pub fn err(id: J, code: i32, msg: impl Into<String>, data: Option<J>) -> RpcResp {
    RpcResp {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(RpcErr { code, message: msg.into(), data }),
    }
}

/// `initialize` result advertised by the shim.
pub fn server_info() -> J {
    json!({
        "serverInfo": { "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": {} }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_skips_empty_fields() {
        let s = serde_json::to_string(&ok(json!(1), json!({"x":1}))).unwrap();
        assert!(!s.contains("error"));
        let s = serde_json::to_string(&err(json!(1), METHOD_NOT_FOUND, "nope", None)).unwrap();
        assert!(!s.contains("result"));
        assert!(s.contains("-32601"));
    }

    #[test]
    fn server_info_names_the_crate() {
        assert_eq!(server_info()["serverInfo"]["name"], "mcp-servlets");
    }
}
