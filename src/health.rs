//! Operator-facing health diagnostics.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::bridge::WorkerBridge;
use crate::config::Config;
use crate::resolver::{self, LaunchPlanReport};

/// Combined health report: launch plan plus a live worker probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub launch: LaunchPlanReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probe the full chain: resolve the worker, connect, and ping the base
/// service through the `crawler.health` tool. Never fails; failures land in
/// the report.
pub async fn health_report(config: &Config, bridge: &WorkerBridge) -> HealthReport {
    let launch = resolver::debug_launch_plan(config);

    match bridge.invoke("crawler.health", Map::new()).await {
        Ok(worker) => HealthReport {
            ok: true,
            launch,
            worker: Some(worker),
            error: None,
        },
        Err(e) => HealthReport {
            ok: false,
            launch,
            worker: None,
            error: Some(e.to_string()),
        },
    }
}
