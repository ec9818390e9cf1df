//! Environment-driven configuration.
//!
//! All knobs come from the process environment (optionally seeded from a
//! `.env` file via `dotenvy`). The config is read once and passed by value
//! to the components that need it.

use std::env;

/// Default base URL of the service hosting the crawl/audit endpoints.
pub const DEFAULT_BASE_SERVICE_URL: &str = "http://localhost:3000";

/// Default user agent sent by the worker on outbound requests.
pub const DEFAULT_USER_AGENT: &str = "crawler-worker";

/// Default reasoning model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Runtime configuration for the bridge, worker and chat orchestrator.
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit worker directory override (`CRAWLER_WORKER_DIR`).
    pub worker_dir_override: Option<String>,
    /// Explicit worker executable override (`CRAWLER_WORKER_BIN`).
    pub worker_exe_override: Option<String>,
    /// Base URL of the crawl/audit service (`BASE_SERVICE_URL`).
    pub base_service_url: String,
    /// User agent for worker HTTP calls (`CRAWLER_USER_AGENT`).
    pub user_agent: String,
    /// Anthropic API key (`ANTHROPIC_API_KEY`).
    pub anthropic_api_key: Option<String>,
    /// Reasoning model identifier (`ANTHROPIC_MODEL`).
    pub anthropic_model: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            worker_dir_override: non_empty(env::var("CRAWLER_WORKER_DIR").ok()),
            worker_exe_override: non_empty(env::var("CRAWLER_WORKER_BIN").ok()),
            base_service_url: non_empty(env::var("BASE_SERVICE_URL").ok())
                .unwrap_or_else(|| DEFAULT_BASE_SERVICE_URL.to_string()),
            user_agent: non_empty(env::var("CRAWLER_USER_AGENT").ok())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            anthropic_api_key: non_empty(env::var("ANTHROPIC_API_KEY").ok()),
            anthropic_model: non_empty(env::var("ANTHROPIC_MODEL").ok())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_dir_override: None,
            worker_exe_override: None,
            base_service_url: DEFAULT_BASE_SERVICE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            anthropic_api_key: None,
            anthropic_model: DEFAULT_MODEL.to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
