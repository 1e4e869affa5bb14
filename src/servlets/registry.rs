use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;

use crate::core::{Args, CallResult, Servlet, ServletError, ToolDescription};
use crate::infra::config::Config;
use crate::infra::logging::log_metric;

#[derive(Clone)]
struct Route {
    servlet: usize,
    tool: String,
}

/// Tool name → owning servlet. Cheap to clone; shared by every session.
#[derive(Clone)]
pub struct Registry {
    servlets: Arc<Vec<Arc<dyn Servlet>>>,
    tools: Arc<Vec<ToolDescription>>,
    routes: Arc<HashMap<String, Route>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Tool names offered by more than one servlet are exposed as
    /// `{servlet}.{tool}` for every owner. Qualified names always route.
    pub fn new(servlets: Vec<Arc<dyn Servlet>>) -> Self {
        let described: Vec<(usize, Vec<ToolDescription>)> = servlets
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.describe()))
            .collect();

        let mut owners: HashMap<&str, usize> = HashMap::new();
        for (_, tools) in &described {
            for t in tools {
                *owners.entry(t.name.as_str()).or_default() += 1;
            }
        }

        let mut tools = Vec::new();
        let mut routes = HashMap::new();
        for (i, list) in &described {
            let servlet = servlets[*i].name();
            for t in list {
                let qualified = format!("{servlet}.{}", t.name);
                let route = Route { servlet: *i, tool: t.name.clone() };
                let exposed = if owners.get(t.name.as_str()).copied().unwrap_or(0) > 1 {
                    tracing::debug!(tool = %t.name, servlet, "tool name shared, exposing qualified name");
                    qualified.clone()
                } else {
                    routes.insert(t.name.clone(), route.clone());
                    t.name.clone()
                };
                routes.insert(qualified, route);
                let mut d = t.clone();
                d.name = exposed;
                tools.push(d);
            }
        }

        Self {
            servlets: Arc::new(servlets),
            tools: Arc::new(tools),
            routes: Arc::new(routes),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(super::build_enabled(cfg))
    }

    /// Every exposed tool, servlet by servlet.
    pub fn list(&self) -> Vec<ToolDescription> {
        self.tools.as_ref().clone()
    }

    pub fn servlet_names(&self) -> Vec<&'static str> {
        self.servlets.iter().map(|s| s.name()).collect()
    }

    /// Tools of one servlet under their exposed names.
    pub fn describe_servlet(&self, name: &str) -> Option<Vec<ToolDescription>> {
        let idx = self.servlets.iter().position(|s| s.name() == name)?;
        Some(
            self.tools
                .iter()
                .filter(|t| {
                    self.routes.get(&t.name).map(|r| r.servlet) == Some(idx)
                })
                .cloned()
                .collect(),
        )
    }

    /// Run a tool. Servlet failures come back as error results; only an
    /// unknown tool or a non-object argument value is an `Err`.
    pub async fn call(&self, name: &str, arguments: &JsonValue) -> Result<CallResult, ServletError> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| ServletError::UnknownTool(name.to_string()))?;
        let args = Args::from_value(arguments)?;
        let servlet = &self.servlets[route.servlet];
        let metric_name = format!("{}.{}", servlet.name(), route.tool);

        let start = Instant::now();
        let out = servlet.call(&route.tool, &args).await;
        log_metric(&metric_name, "call_latency_ms", start.elapsed().as_millis() as f64);

        Ok(match out {
            Ok(result) => {
                tracing::info!(tool = %metric_name, is_error = result.is_error, "tool call finished");
                result
            }
            Err(e) => {
                log_metric(&metric_name, "call_error_total", 1.0);
                tracing::warn!(tool = %metric_name, error = %e, "tool call failed");
                CallResult::error(e.to_string())
            }
        })
    }
}
