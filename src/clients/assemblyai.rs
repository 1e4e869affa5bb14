use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{execute, execute_read, join, parse, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://api.assemblyai.com/v2";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct Upload {
    upload_url: String,
}

/// AssemblyAI v2 client; the key goes in `Authorization` as is.
#[derive(Clone)]
pub struct AssemblyAiClient {
    base: String,
    api_key: String,
    http: Client,
}

impl AssemblyAiClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base: base.into(), api_key: api_key.into(), http: make_http_client() }
    }

    /// Upload raw audio, returning the private URL to transcribe.
    pub async fn upload(&self, audio: Vec<u8>) -> Result<String, ServletError> {
        let b = self
            .http
            .post(join(&self.base, "upload"))
            .header(AUTHORIZATION, &self.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(audio);
        let body = execute(b, "assembly-ai.upload", "upload failed", Accept::Only(&[200])).await?;
        Ok(parse::<Upload>(&body, "upload failed")?.upload_url)
    }

    pub async fn submit(&self, audio_url: &str) -> Result<Transcript, ServletError> {
        let b = self
            .http
            .post(join(&self.base, "transcript"))
            .header(AUTHORIZATION, &self.api_key)
            .json(&json!({ "audio_url": audio_url }));
        let body = execute(b, "assembly-ai.transcript", "transcript submission failed", Accept::Only(&[200])).await?;
        parse(&body, "transcript submission failed")
    }

    pub async fn transcript(&self, id: &str) -> Result<Transcript, ServletError> {
        let url = join(&self.base, &format!("transcript/{}", urlencoding::encode(id)));
        let body = execute_read(
            || self.http.get(&url).header(AUTHORIZATION, &self.api_key),
            "assembly-ai.poll",
            "get transcript failed",
            Accept::Only(&[200]),
        )
        .await?;
        parse(&body, "get transcript failed")
    }
}
