//! Servlets: one module per upstream API, each a static tool table plus dispatch.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::core::Servlet;
use crate::infra::config::{Config, FileConfig};

pub mod amadeus;
pub mod assemblyai;
pub mod bluesky;
pub mod brave;
pub mod calendar;
pub mod crypto;
pub mod github;
pub mod maps;
pub mod onedrive;
pub mod registry;
pub mod tenor;
pub mod trello;
pub mod wordpress;

pub use registry::Registry;

/// Object schema with the given properties and required list.
pub fn schema(properties: JsonValue, required: &[&str]) -> JsonValue {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Every known servlet name, in registry order.
pub const ALL: &[&str] = &[
    crypto::CryptoServlet::NAME,
    github::GithubServlet::NAME,
    trello::TrelloServlet::NAME,
    bluesky::BlueskyServlet::NAME,
    wordpress::WordpressServlet::NAME,
    calendar::CalendarServlet::NAME,
    amadeus::AmadeusServlet::NAME,
    brave::BraveServlet::NAME,
    maps::MapsServlet::NAME,
    onedrive::OnedriveServlet::NAME,
    tenor::TenorServlet::NAME,
    assemblyai::AssemblyAiServlet::NAME,
];

/// Construct a servlet by name with its section of the config file.
pub fn build(name: &str, file: &FileConfig) -> Option<Arc<dyn Servlet>> {
    let cfg = file.servlet(name);
    let s: Arc<dyn Servlet> = match name {
        crypto::CryptoServlet::NAME => Arc::new(crypto::CryptoServlet),
        github::GithubServlet::NAME => Arc::new(github::GithubServlet::new(cfg)),
        trello::TrelloServlet::NAME => Arc::new(trello::TrelloServlet::new(cfg)),
        bluesky::BlueskyServlet::NAME => Arc::new(bluesky::BlueskyServlet::new(cfg)),
        wordpress::WordpressServlet::NAME => Arc::new(wordpress::WordpressServlet::new(cfg)),
        calendar::CalendarServlet::NAME => Arc::new(calendar::CalendarServlet::new(cfg)),
        amadeus::AmadeusServlet::NAME => Arc::new(amadeus::AmadeusServlet::new(cfg)),
        brave::BraveServlet::NAME => Arc::new(brave::BraveServlet::new(cfg)),
        maps::MapsServlet::NAME => Arc::new(maps::MapsServlet::new(cfg)),
        onedrive::OnedriveServlet::NAME => Arc::new(onedrive::OnedriveServlet::new(cfg)),
        tenor::TenorServlet::NAME => Arc::new(tenor::TenorServlet::new(cfg)),
        assemblyai::AssemblyAiServlet::NAME => Arc::new(assemblyai::AssemblyAiServlet::new(cfg)),
        _ => return None,
    };
    Some(s)
}

/// All enabled servlets; unknown names in the enabled list are logged and skipped.
pub fn build_enabled(cfg: &Config) -> Vec<Arc<dyn Servlet>> {
    if let Some(list) = &cfg.enabled {
        for name in list.iter().filter(|n| !ALL.contains(&n.as_str())) {
            tracing::warn!(servlet = %name, "unknown servlet in enabled list");
        }
    }
    ALL.iter()
        .filter(|n| cfg.is_enabled(n))
        .filter_map(|n| build(n, &cfg.file))
        .collect()
}
