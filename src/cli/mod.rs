use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::process::ExitCode;

use crate::infra::boot;
use crate::infra::config::Config;
use crate::servlets::Registry;

#[derive(Parser)]
#[command(name = "mcp-servlets")]
#[command(about = "MCP servlets for third-party web APIs")]
#[command(version)]
pub struct Cli {
    /// Without a subcommand the server starts in the mode given by MODE
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve MCP (and the JSON-RPC shim unless DEPRECATE_REST is set) over HTTP
    Serve {
        /// Port to listen on; defaults to PORT or 8080
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Serve MCP over stdin/stdout
    Stdio,
    /// Print the tool list as JSON
    Describe {
        /// Only this servlet's tools
        #[arg(short, long)]
        servlet: Option<String>,
    },
    /// Run one tool call locally and print the result JSON
    Call {
        /// Tool name as listed by `describe`
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Health check a running server
    Health {
        /// Service URL to check
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Validate configuration
    Config,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    run_commands(cli.command, Config::from_env()).await
}

pub async fn run_commands(command: Option<Commands>, cfg: Config) -> ExitCode {
    match command {
        None => report_server(boot::run(cfg).await),
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            let registry = Registry::from_config(&cfg);
            report_server(boot::run_http(registry, port, !cfg.deprecate_rest).await)
        }
        Some(Commands::Stdio) => report_server(boot::run_stdio(Registry::from_config(&cfg)).await),
        Some(Commands::Describe { servlet }) => match describe(&Registry::from_config(&cfg), servlet.as_deref()) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ {e}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::Call { tool, args }) => match call(&Registry::from_config(&cfg), &tool, &args).await {
            Ok((out, is_error)) => {
                println!("{out}");
                if is_error {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                eprintln!("❌ Call failed: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::Health { url }) => match health_check(&url).await {
            Ok(_) => {
                println!("✅ Service is healthy");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Health check failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Some(Commands::Config) => match validate_config(&cfg) {
            Ok(_) => {
                println!("✅ Configuration is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Configuration validation failed: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn report_server(outcome: anyhow::Result<()>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

fn describe(registry: &Registry, servlet: Option<&str>) -> anyhow::Result<String> {
    let tools = match servlet {
        Some(name) => registry
            .describe_servlet(name)
            .ok_or_else(|| anyhow::anyhow!("unknown or disabled servlet: {name}"))?,
        None => registry.list(),
    };
    Ok(serde_json::to_string_pretty(&serde_json::json!({ "tools": tools }))?)
}

/// Pretty result JSON and its error flag.
async fn call(registry: &Registry, tool: &str, args: &str) -> anyhow::Result<(String, bool)> {
    let args: JsonValue = serde_json::from_str(args).map_err(|e| anyhow::anyhow!("--args is not JSON: {e}"))?;
    let result = registry.call(tool, &args).await?;
    Ok((serde_json::to_string_pretty(&result)?, result.is_error))
}

async fn health_check(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/healthz", url.trim_end_matches('/')))
        .timeout(std::time::Duration::from_millis(500))
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("HTTP {}", response.status()).into())
    }
}

fn validate_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !matches!(cfg.mode.as_str(), "server" | "stdio") {
        return Err(format!("Invalid MODE: {}. Must be 'server' or 'stdio'", cfg.mode).into());
    }
    if cfg.mode == "server" && cfg.port == 0 {
        return Err("PORT cannot be 0".into());
    }
    if let Some(enabled) = &cfg.enabled {
        let unknown: Vec<&str> = enabled
            .iter()
            .map(String::as_str)
            .filter(|s| !crate::servlets::ALL.contains(s))
            .collect();
        if !unknown.is_empty() {
            return Err(format!("Unknown servlets enabled: {}", unknown.join(", ")).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::FileConfig;
    use serial_test::serial;
    use std::env;

    fn clean_config() -> Config {
        for k in ["MODE", "PORT", "DEPRECATE_REST", "SERVLETS_ENABLED"] {
            env::remove_var(k);
        }
        Config::with_file(FileConfig::default())
    }

    #[tokio::test]
    async fn health_check_ok_and_error_paths() {
        use httpmock::prelude::*;
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/healthz");
            then.status(200).body("ok");
        });
        assert!(health_check(&server.base_url()).await.is_ok());

        let bad = MockServer::start();
        bad.mock(|when, then| {
            when.method(GET).path("/healthz");
            then.status(500);
        });
        assert!(health_check(&bad.base_url()).await.is_err());
    }

    #[tokio::test]
    async fn health_check_fails_without_server() {
        assert!(health_check("http://localhost:9").await.is_err());
    }

    #[test]
    #[serial]
    fn validate_config_defaults_are_valid() {
        assert!(validate_config(&clean_config()).is_ok());
    }

    #[test]
    #[serial]
    fn validate_config_invalid_mode() {
        let mut cfg = clean_config();
        cfg.mode = "invalid".into();
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Invalid MODE"));
    }

    #[test]
    #[serial]
    fn validate_config_invalid_port() {
        let mut cfg = clean_config();
        cfg.port = 0;
        assert!(validate_config(&cfg).unwrap_err().to_string().contains("PORT cannot be 0"));
        cfg.mode = "stdio".into();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    #[serial]
    fn validate_config_rejects_unknown_servlets() {
        let mut cfg = clean_config();
        cfg.enabled = Some(vec!["github".into(), "myspace".into()]);
        let err = validate_config(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "Unknown servlets enabled: myspace");
    }

    #[test]
    #[serial]
    fn describe_one_servlet() {
        let registry = Registry::from_config(&clean_config());
        let out = describe(&registry, Some("crypto-hash")).unwrap();
        let v: JsonValue = serde_json::from_str(&out).unwrap();
        let names: Vec<&str> = v["tools"].as_array().unwrap().iter().filter_map(|t| t["name"].as_str()).collect();
        assert!(names.contains(&"sha256"));
        assert!(!names.contains(&"create-issue"));
        assert!(describe(&registry, Some("nope")).is_err());
    }

    #[tokio::test]
    #[serial]
    async fn call_runs_locally() {
        let registry = Registry::from_config(&clean_config());
        let (out, is_error) = call(&registry, "sha256", r#"{"text":"abc"}"#).await.unwrap();
        assert!(!is_error);
        assert!(out.contains("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"));
        assert!(call(&registry, "sha256", "not json").await.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn call_exit_code_follows_error_flag() {
        let code = run_commands(
            Some(Commands::Call { tool: "md5".into(), args: "{}".into() }),
            clean_config(),
        )
        .await;
        assert_eq!(code, ExitCode::FAILURE);
        let code = run_commands(
            Some(Commands::Call { tool: "md5".into(), args: r#"{"text":"x"}"#.into() }),
            clean_config(),
        )
        .await;
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    #[serial]
    async fn run_commands_config_and_health() {
        let code = run_commands(Some(Commands::Config), clean_config()).await;
        assert_eq!(code, ExitCode::SUCCESS);
        let code = run_commands(Some(Commands::Health { url: "http://localhost:9".into() }), clean_config()).await;
        assert_eq!(code, ExitCode::FAILURE);
    }
}
