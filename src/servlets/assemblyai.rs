//! AssemblyAI speech-to-text.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use super::schema;
use crate::clients::assemblyai::{AssemblyAiClient, TranscriptStatus, DEFAULT_BASE};
use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::ServletConfig;

const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
const DEFAULT_MAX_POLLS: u32 = 200;

pub struct AssemblyAiServlet {
    config: ServletConfig,
}

impl AssemblyAiServlet {
    pub const NAME: &'static str = "assembly-ai";

    pub fn new(config: ServletConfig) -> Self {
        Self { config }
    }

    fn poll_interval(&self) -> Duration {
        let ms = self
            .config
            .get("poll-interval-ms")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    /// `audio_path` reads from the server's filesystem, so it needs `allow-local-files`.
    fn local_files_allowed(&self) -> bool {
        self.config
            .get("allow-local-files")
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    }

    fn max_polls(&self) -> u32 {
        self.config.get("max-polls").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_MAX_POLLS)
    }

    /// Upload, submit, then poll until the transcript settles or polls run out.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, ServletError> {
        let client = AssemblyAiClient::new(self.config.base_url("base-url", DEFAULT_BASE), self.config.require("api-key")?);
        let upload_url = client.upload(audio).await?;
        let mut transcript = client.submit(&upload_url).await?;
        let interval = self.poll_interval();
        let mut polls = 0;
        loop {
            match transcript.status {
                TranscriptStatus::Completed => return Ok(transcript.text.unwrap_or_default()),
                TranscriptStatus::Error => {
                    let reason = transcript.error.unwrap_or_default();
                    return Err(ServletError::Message(format!("transcription failed: {reason}")));
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {}
            }
            if polls >= self.max_polls() {
                tracing::warn!(id = %transcript.id, polls, "transcript did not settle");
                return Err(ServletError::Message("transcription timed out".into()));
            }
            polls += 1;
            tokio::time::sleep(interval).await;
            transcript = client.transcript(&transcript.id).await?;
            tracing::debug!(id = %transcript.id, status = ?transcript.status, "transcript status");
        }
    }
}

async fn audio_bytes(args: &Args, local_files: bool) -> Result<Vec<u8>, ServletError> {
    if let Some(b64) = args.str("audio_base64") {
        return STANDARD
            .decode(b64.as_bytes())
            .map_err(|e| ServletError::invalid(format!("failed to decode base64 audio: {e}")));
    }
    if let Some(path) = args.str("audio_path") {
        if !local_files {
            return Err(ServletError::invalid(
                "audio_path is disabled on this server; send audio_base64 or set allow-local-files",
            ));
        }
        return tokio::fs::read(&path)
            .await
            .map_err(|e| ServletError::invalid(format!("failed to read audio file {path}: {e}")));
    }
    Err(ServletError::invalid("either audio_path or audio_base64 must be provided"))
}

#[async_trait]
impl Servlet for AssemblyAiServlet {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<ToolDescription> {
        vec![ToolDescription::new(
            "transcribe",
            "Transcribe an audio file (mp3, wav, flac, aac, m4a and more) and return the text. Provide audio_base64, or audio_path when the server allows local files",
            schema(
                json!({
                    "audio_path": { "type": "string", "description": "Path of an audio file on the server; only with allow-local-files" },
                    "audio_base64": { "type": "string", "description": "Base64 encoded audio" }
                }),
                &[],
            ),
        )]
    }

    async fn call(&self, tool: &str, args: &Args) -> Result<CallResult, ServletError> {
        if tool != "transcribe" {
            return Err(ServletError::UnknownTool(tool.to_string()));
        }
        let audio = audio_bytes(args, self.local_files_allowed()).await?;
        tracing::info!(bytes = audio.len(), "transcribing audio");
        Ok(CallResult::text(self.transcribe(audio).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::Value as JsonValue;

    fn args(v: JsonValue) -> Args {
        Args::from_value(&v).unwrap()
    }

    fn servlet(base: &str, max_polls: &str) -> AssemblyAiServlet {
        AssemblyAiServlet::new(ServletConfig::from_pairs(
            "assembly-ai",
            [("api-key", "ak"), ("base-url", base), ("poll-interval-ms", "1"), ("max-polls", max_polls)],
        ))
    }

    fn mock_upload_and_submit(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/upload");
            then.status(200).body("{\"upload_url\":\"https://cdn/u1\"}");
        });
        server.mock(|when, then| {
            when.method(POST).path("/transcript").json_body(json!({"audio_url": "https://cdn/u1"}));
            then.status(200).body("{\"id\":\"t1\",\"status\":\"queued\"}");
        });
    }

    #[tokio::test]
    async fn needs_some_audio() {
        let err = servlet("http://unused", "1").call("transcribe", &args(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "either audio_path or audio_base64 must be provided");
    }

    #[tokio::test]
    async fn local_paths_need_opt_in() {
        let err = servlet("http://unused", "1")
            .call("transcribe", &args(json!({"audio_path": "/etc/passwd"})))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "audio_path is disabled on this server; send audio_base64 or set allow-local-files"
        );
    }

    #[tokio::test]
    async fn local_paths_are_read_when_allowed() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST).path("/upload").body("RIFF");
            then.status(200).body("{\"upload_url\":\"https://cdn/u1\"}");
        });
        server.mock(|when, then| {
            when.method(POST).path("/transcript");
            then.status(200).body("{\"id\":\"t1\",\"status\":\"completed\",\"text\":\"hi\"}");
        });
        let path = std::env::temp_dir().join(format!("mcp-servlets-audio-{}.wav", std::process::id()));
        std::fs::write(&path, b"RIFF").unwrap();
        let s = AssemblyAiServlet::new(ServletConfig::from_pairs(
            "assembly-ai",
            [("api-key", "ak"), ("base-url", server.base_url().as_str()), ("allow-local-files", "true")],
        ));
        let out = s
            .call("transcribe", &args(json!({"audio_path": path.to_string_lossy()})))
            .await
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        upload.assert();
        assert_eq!(out.first_text(), Some("hi"));
    }

    #[tokio::test]
    async fn polls_until_completed() {
        let server = MockServer::start();
        mock_upload_and_submit(&server);
        let poll = server.mock(|when, then| {
            when.method(GET).path("/transcript/t1").header("authorization", "ak");
            then.status(200).body("{\"id\":\"t1\",\"status\":\"completed\",\"text\":\"hello world\"}");
        });
        let out = servlet(&server.base_url(), "5")
            .call("transcribe", &args(json!({"audio_base64": STANDARD.encode("RIFF")})))
            .await
            .unwrap();
        poll.assert_hits(1);
        assert_eq!(out.first_text(), Some("hello world"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start();
        mock_upload_and_submit(&server);
        server.mock(|when, then| {
            when.method(GET).path("/transcript/t1");
            then.status(200).body("{\"id\":\"t1\",\"status\":\"error\",\"error\":\"no speech\"}");
        });
        let err = servlet(&server.base_url(), "5")
            .call("transcribe", &args(json!({"audio_base64": STANDARD.encode("RIFF")})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "transcription failed: no speech");
    }

    #[tokio::test]
    async fn gives_up_after_max_polls() {
        let server = MockServer::start();
        mock_upload_and_submit(&server);
        let poll = server.mock(|when, then| {
            when.method(GET).path("/transcript/t1");
            then.status(200).body("{\"id\":\"t1\",\"status\":\"processing\"}");
        });
        let err = servlet(&server.base_url(), "3")
            .call("transcribe", &args(json!({"audio_base64": STANDARD.encode("RIFF")})))
            .await
            .unwrap_err();
        poll.assert_hits(3);
        assert_eq!(err.to_string(), "transcription timed out");
    }
}
