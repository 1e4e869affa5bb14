use crate::infra::config::Config;
use crate::servlets::Registry;
use std::net::SocketAddr;

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let registry = Registry::from_config(&cfg);
    tracing::info!(
        mode = %cfg.mode,
        port = cfg.port,
        deprecate_rest = cfg.deprecate_rest,
        servlets = ?registry.servlet_names(),
        tools = registry.list().len(),
        "BOOT mcp-servlets"
    );

    // Stdio mode: run MCP over stdio ONLY (no HTTP).
    if cfg.mode == "stdio" {
        return run_stdio(registry).await;
    }
    run_http(registry, cfg.port, !cfg.deprecate_rest).await
}

pub async fn run_stdio(registry: Registry) -> anyhow::Result<()> {
    crate::infra::runtime::mcp_transport::serve_stdio(move || {
        crate::infra::mcp::ServletsSvc::new(registry)
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

pub async fn run_http(registry: Registry, port: u16, with_rpc: bool) -> anyhow::Result<()> {
    let app = if with_rpc {
        crate::infra::http_app::build_app_with_rpc(registry)
    } else {
        crate::infra::http_app::build_app_default(registry)
    };

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, "listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
