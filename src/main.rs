use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    mcp_servlets::infra::logging::init();
    mcp_servlets::cli::run().await
}
