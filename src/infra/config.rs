use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::error::ServletError;

const DEFAULT_CONFIG_FILE: &str = "servlets.toml";

/// Process level settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: String, // "server" or "stdio"
    pub port: u16,
    pub deprecate_rest: bool,
    /// `None` means every servlet is enabled.
    pub enabled: Option<Vec<String>>,
    pub file: FileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub servlets: ServletsSection,
    /// Per-servlet tables, keyed by servlet name.
    #[serde(flatten)]
    pub sections: HashMap<String, toml::Table>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    pub mode: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServletsSection {
    pub enabled: Option<Vec<String>>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, ServletError> {
        toml::from_str(text).map_err(|e| ServletError::Message(format!("invalid config file: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, ServletError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServletError::Message(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn servlet(&self, name: &str) -> ServletConfig {
        let values = self
            .sections
            .get(name)
            .map(|t| {
                t.iter()
                    .filter_map(|(k, v)| toml_scalar(v).map(|s| (k.clone(), s)))
                    .collect()
            })
            .unwrap_or_default();
        ServletConfig { servlet: name.to_string(), values, use_env: true }
    }
}

fn toml_scalar(v: &toml::Value) -> Option<String> {
    match v {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let path = std::env::var("SERVLETS_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file = match &path {
            Some(p) => FileConfig::load(p).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring config file");
                FileConfig::default()
            }),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                FileConfig::load(Path::new(DEFAULT_CONFIG_FILE)).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ignoring config file");
                    FileConfig::default()
                })
            }
            None => FileConfig::default(),
        };
        Self::with_file(file)
    }

    /// Environment wins over the file.
    pub fn with_file(file: FileConfig) -> Self {
        let mode = std::env::var("MODE")
            .ok()
            .or_else(|| file.server.mode.clone())
            .unwrap_or_else(|| "server".into());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .or(file.server.port)
            .unwrap_or(8080);
        let deprecate_rest = std::env::var("DEPRECATE_REST")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        let enabled = std::env::var("SERVLETS_ENABLED")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .or_else(|| file.servlets.enabled.clone());

        Self { mode, port, deprecate_rest, enabled, file }
    }

    pub fn is_enabled(&self, servlet: &str) -> bool {
        match &self.enabled {
            None => true,
            Some(list) => list.iter().any(|s| s == servlet),
        }
    }
}

/// Key/value lookup for one servlet: environment first, then its file table.
#[derive(Debug, Clone, Default)]
pub struct ServletConfig {
    servlet: String,
    values: HashMap<String, String>,
    use_env: bool,
}

impl ServletConfig {
    /// Fixed values only, no environment lookup.
    pub fn from_pairs<'a>(servlet: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            servlet: servlet.to_string(),
            values: pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            use_env: false,
        }
    }

    pub fn env_key(&self, key: &str) -> String {
        format!("{}_{}", self.servlet, key)
            .to_ascii_uppercase()
            .replace(['-', '.'], "_")
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if self.use_env {
            if let Ok(v) = std::env::var(self.env_key(key)) {
                if !v.trim().is_empty() {
                    return Some(v);
                }
            }
        }
        self.values.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, key: &str) -> Result<String, ServletError> {
        self.get(key).ok_or_else(|| ServletError::NotConfigured(key.to_string()))
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self, key: &str, default: &str) -> String {
        self.get_or(key, default).trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for k in ["MODE", "PORT", "DEPRECATE_REST", "SERVLETS_ENABLED", "SERVLETS_CONFIG"] {
            std::env::remove_var(k);
        }
    }

    #[test]
    #[serial]
    fn defaults_to_server_8080_and_rest_enabled() {
        clear();
        let cfg = Config::with_file(FileConfig::default());
        assert_eq!(cfg.mode, "server");
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.deprecate_rest);
        assert!(cfg.is_enabled("github"));
    }

    #[test]
    #[serial]
    fn parses_env_overrides() {
        clear();
        std::env::set_var("MODE", "stdio");
        std::env::set_var("PORT", "9090");
        std::env::set_var("DEPRECATE_REST", "1");
        std::env::set_var("SERVLETS_ENABLED", "github, tenor");
        let cfg = Config::with_file(FileConfig::default());
        assert_eq!(cfg.mode, "stdio");
        assert_eq!(cfg.port, 9090);
        assert!(cfg.deprecate_rest);
        assert!(cfg.is_enabled("tenor"));
        assert!(!cfg.is_enabled("trello"));
        clear();
    }

    #[test]
    #[serial]
    fn reads_file_sections() {
        clear();
        let file = FileConfig::parse(
            r#"
            [server]
            port = 7000

            [servlets]
            enabled = ["github"]

            [github]
            api-key = "abc"
            retries = 3
            "#,
        )
        .unwrap();
        let cfg = Config::with_file(file);
        assert_eq!(cfg.port, 7000);
        assert!(!cfg.is_enabled("tenor"));
        let gh = cfg.file.servlet("github");
        assert_eq!(gh.get("api-key").as_deref(), Some("abc"));
        assert_eq!(gh.get("retries").as_deref(), Some("3"));
        assert!(cfg.file.servlet("tenor").get("api-key").is_none());
    }

    #[test]
    #[serial]
    fn environment_overrides_file_values() {
        let file = FileConfig::parse("[google-calendar]\nclient-id = \"file\"\n").unwrap();
        let sc = file.servlet("google-calendar");
        assert_eq!(sc.env_key("client-id"), "GOOGLE_CALENDAR_CLIENT_ID");
        std::env::set_var("GOOGLE_CALENDAR_CLIENT_ID", "env");
        assert_eq!(sc.get("client-id").as_deref(), Some("env"));
        std::env::remove_var("GOOGLE_CALENDAR_CLIENT_ID");
        assert_eq!(sc.get("client-id").as_deref(), Some("file"));
    }

    #[test]
    fn require_reports_missing_key() {
        let sc = ServletConfig::from_pairs("tenor", [("api-key", "  ")]);
        let err = sc.require("api-key").unwrap_err();
        assert_eq!(err.to_string(), "missing configuration: api-key");
        assert_eq!(sc.base_url("base-url", "https://x.test/v2/"), "https://x.test/v2");
    }
}
