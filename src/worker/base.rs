//! HTTP client for the base service hosting the crawl/audit endpoints.
//!
//! The service replies `{"ok": true, ...}` on success and
//! `{"ok": false, "error": "..."}` on failure. A non-2xx status is treated
//! the same as `ok: false`; the error message prefers the service-provided
//! `error` field over a generic status line.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::envelope;

/// Errors from base-service calls.
#[derive(Debug, Error)]
pub enum BaseServiceError {
    /// The request never produced a usable HTTP response.
    #[error("{0}")]
    Transport(String),
    /// The service responded, but reported a failure.
    #[error("{0}")]
    Service(String),
}

/// Shared state handed to every worker tool handler.
pub struct WorkerContext {
    http: reqwest::Client,
    pub base_url: String,
    pub user_agent: String,
}

impl WorkerContext {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user_agent: user_agent.into(),
        }
    }

    /// POST a JSON body to a service path and decode the `ok` envelope.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, BaseServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, body = %envelope::peek_value(body), "HTTP POST");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(body)
            .send()
            .await
            .map_err(|e| BaseServiceError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BaseServiceError::Transport(e.to_string()))?;

        // A body that is not JSON still carries information; keep it.
        let data: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) if text.is_empty() => serde_json::json!({}),
            Err(_) => serde_json::json!({ "raw": text }),
        };

        debug!(
            url = %url,
            status = status.as_u16(),
            data = %envelope::peek_value(&data),
            "HTTP RESP"
        );

        let reported_failure = data.get("ok").and_then(Value::as_bool) == Some(false);
        if !status.is_success() || reported_failure {
            let message = data
                .get("error")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {} {}", status.as_u16(), url));
            return Err(BaseServiceError::Service(message));
        }

        Ok(data)
    }

    /// GET a service path and report whether it answered with a 2xx.
    pub async fn ping(&self, path: &str) -> Result<u16, BaseServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| BaseServiceError::Transport(e.to_string()))?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "HTTP GET");
        Ok(status.as_u16())
    }
}
