//! Local hashing tools; no upstream API.

use async_trait::async_trait;
use md5::Md5;
use serde_json::json;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::schema;
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};

const DEFAULT_COST: u32 = 10;

pub struct CryptoServlet;

impl CryptoServlet {
    pub const NAME: &'static str = "crypto-hash";
}

fn hex_digest<D: Digest>(text: &str) -> String {
    hex::encode(D::digest(text.as_bytes()))
}

fn text_schema() -> serde_json::Value {
    schema(json!({ "text": { "type": "string", "description": "Text to hash" } }), &["text"])
}

pub fn bcrypt_hash(password: &str, cost: Option<i64>) -> Result<String, ServletError> {
    let cost = match cost {
        None => DEFAULT_COST,
        Some(c) if (4..=31).contains(&c) => c as u32,
        Some(_) => return Err(ServletError::invalid("cost must be between 4 and 31")),
    };
    bcrypt::hash(password, cost).map_err(|e| ServletError::Message(format!("bcrypt failed: {e}")))
}

#[async_trait]
impl Servlet for CryptoServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription::new("md5", "MD5 hex digest of the given text", text_schema()),
            ToolDescription::new("sha1", "SHA-1 hex digest of the given text", text_schema()),
            ToolDescription::new("sha256", "SHA-256 hex digest of the given text", text_schema()),
            ToolDescription::new("sha2", "Alias of sha256", text_schema()),
            ToolDescription::new(
                "bcrypt",
                "bcrypt hash of a password",
                schema(
                    json!({
                        "password": { "type": "string" },
                        "cost": { "type": "integer", "minimum": 4, "maximum": 31, "default": DEFAULT_COST }
                    }),
                    &["password"],
                ),
            ),
        ]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        let digest = match tool {
            "md5" => hex_digest::<Md5>(&args.require_text("text")?),
            "sha1" => hex_digest::<Sha1>(&args.require_text("text")?),
            "sha256" | "sha2" => hex_digest::<Sha256>(&args.require_text("text")?),
            "bcrypt" => bcrypt_hash(&args.require_text("password")?, args.i64("cost")?)?,
            other => return Err(ServletError::UnknownTool(other.to_string())),
        };
        Ok(CallResult::text(digest))
    }
}
