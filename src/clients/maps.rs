use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::{check_status, send, Accept};
use crate::core::error::ServletError;
use crate::infra::runtime::limits::make_http_client;

pub const DEFAULT_BASE: &str = "https://maps.googleapis.com/maps/api/staticmap";

/// Fetched map image.
#[derive(Debug)]
pub struct MapImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Clone)]
pub struct MapsClient {
    base: String,
    api_key: String,
    http: Client,
}

impl MapsClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base: base.into(), api_key: api_key.into(), http: make_http_client() }
    }

    /// GET the static map for `params`; `format` and `key` are always sent.
    pub async fn static_map(&self, params: &[(&str, String)]) -> Result<MapImage, ServletError> {
        let b = self
            .http
            .get(&self.base)
            .query(&[("format", "png"), ("key", self.api_key.as_str())])
            .query(params);
        let resp = send(b, "google-maps-image.staticmap").await?;
        let mime_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());
        let resp = check_status(resp, "google-maps-image.staticmap", "Failed to fetch map image", Accept::Success).await?;
        let bytes = resp.bytes().await?.to_vec();
        Ok(MapImage { bytes, mime_type })
    }
}
