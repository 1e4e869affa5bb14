pub fn init() {
    // Initialize tracing subscriber once, honoring RUST_LOG if set.
    // Logs go to stderr so stdio mode keeps stdout for protocol frames.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Record a per-tool measurement as a log line and through the `metrics` facade.
/// Names ending in `_total` are counters, everything else a histogram.
pub fn log_metric(tool: &str, metric: &str, value: f64) {
    tracing::info!(tool = tool, metric = metric, value = value, "metric");
    let name = format!("servlets_{metric}");
    if metric.ends_with("_total") {
        metrics::counter!(name, "tool" => tool.to_string()).increment(value as u64);
    } else {
        metrics::histogram!(name, "tool" => tool.to_string()).record(value);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
    }

    #[test]
    fn metrics_without_recorder_are_noops() {
        super::log_metric("github.get-issue", "remote_error_total", 1.0);
        super::log_metric("github.get-issue", "remote_latency_ms", 12.5);
    }
}
