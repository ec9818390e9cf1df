//! Worker tool implementations.
//!
//! Every handler returns a [`CallToolResult`]; failures become sentinel text
//! with `is_error` set rather than an `Err`, so nothing past the handler can
//! take the worker down. Successful results always carry the `RESULT_JSON:`
//! envelope as text, never a native JSON segment.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::bridge::types::{CallToolResult, Tool};
use crate::envelope;

use super::base::WorkerContext;

/// Default crawl depth applied when the caller omits one.
pub const DEFAULT_CRAWL_DEPTH: u32 = 2;

/// Default page cap applied when the caller omits one.
pub const DEFAULT_MAX_PAGES: u32 = 500;

/// Trait for worker tool handlers.
#[async_trait]
pub trait WorkerTool: Send + Sync {
    /// Wire descriptor advertised via `tools/list`.
    fn descriptor(&self) -> Tool;

    /// Handle a call. Must not panic; failures are sentinel results.
    async fn call(&self, ctx: &WorkerContext, args: Map<String, Value>) -> CallToolResult;
}

fn ok_envelope(value: &Value) -> CallToolResult {
    CallToolResult::text(envelope::wrap_json(value))
}

fn err_sentinel(message: impl AsRef<str>) -> CallToolResult {
    CallToolResult::error(envelope::error_sentinel(message.as_ref()))
}

// ============================================================================
// echo.args
// ============================================================================

/// Diagnostic echo: returns the arguments exactly as they reached the handler.
pub struct EchoArgsTool;

#[async_trait]
impl WorkerTool for EchoArgsTool {
    fn descriptor(&self) -> Tool {
        Tool {
            name: "echo.args".to_string(),
            description: Some("Returns the arguments exactly as received".to_string()),
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn call(&self, _ctx: &WorkerContext, args: Map<String, Value>) -> CallToolResult {
        let args_peek = envelope::peek_value(&Value::Object(args.clone()));
        debug!(args = %args_peek, "echo.args");
        ok_envelope(&json!({ "args": args }))
    }
}

// ============================================================================
// crawler.health
// ============================================================================

/// Pings the base service crawl endpoint.
pub struct CrawlerHealthTool;

#[async_trait]
impl WorkerTool for CrawlerHealthTool {
    fn descriptor(&self) -> Tool {
        Tool {
            name: "crawler.health".to_string(),
            description: Some("Ping the crawl endpoint of the base service".to_string()),
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn call(&self, ctx: &WorkerContext, _args: Map<String, Value>) -> CallToolResult {
        match ctx.ping("/api/crawl").await {
            Ok(status) if (200..300).contains(&status) => CallToolResult::text(format!(
                "OK: service at {} is responding",
                ctx.base_url
            )),
            Ok(status) => err_sentinel(format!("{}", status)),
            Err(e) => err_sentinel(e.to_string()),
        }
    }
}

// ============================================================================
// crawl.site
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CrawlArgs {
    start_url: String,
    depth: Option<u32>,
    max_pages: Option<u32>,
    include_subdomains: Option<bool>,
    user_agent: Option<String>,
}

impl CrawlArgs {
    fn validate(&self) -> Result<(), String> {
        if self.start_url.trim().is_empty() {
            return Err("startUrl must not be empty".to_string());
        }
        if !self.start_url.starts_with("http://") && !self.start_url.starts_with("https://") {
            return Err(format!("startUrl must be an http(s) URL: {}", self.start_url));
        }
        if let Some(depth) = self.depth {
            if depth > 6 {
                return Err(format!("depth must be between 0 and 6, got {}", depth));
            }
        }
        if let Some(max_pages) = self.max_pages {
            if !(1..=5000).contains(&max_pages) {
                return Err(format!(
                    "maxPages must be between 1 and 5000, got {}",
                    max_pages
                ));
            }
        }
        Ok(())
    }
}

/// Crawls a site through the base service, respecting robots and sitemaps.
pub struct CrawlSiteTool;

#[async_trait]
impl WorkerTool for CrawlSiteTool {
    fn descriptor(&self) -> Tool {
        Tool {
            name: "crawl.site".to_string(),
            description: Some(
                "Discover internal URLs of a site, respecting robots.txt and sitemaps".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "startUrl": { "type": "string", "format": "uri" },
                    "depth": { "type": "integer", "minimum": 0, "maximum": 6 },
                    "maxPages": { "type": "integer", "minimum": 1, "maximum": 5000 },
                    "includeSubdomains": { "type": "boolean" },
                    "userAgent": { "type": "string" }
                },
                "required": ["startUrl"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, ctx: &WorkerContext, args: Map<String, Value>) -> CallToolResult {
        let args: CrawlArgs = match serde_json::from_value(Value::Object(args)) {
            Ok(parsed) => parsed,
            Err(e) => return err_sentinel(format!("invalid crawl.site arguments: {}", e)),
        };
        if let Err(msg) = args.validate() {
            return err_sentinel(msg);
        }

        // Defaulting happens here so the service always receives a complete
        // payload, whatever the caller omitted.
        let payload = json!({
            "startUrl": args.start_url,
            "depth": args.depth.unwrap_or(DEFAULT_CRAWL_DEPTH),
            "maxPages": args.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            "includeSubdomains": args.include_subdomains.unwrap_or(false),
            "userAgent": args.user_agent.as_deref().unwrap_or(&ctx.user_agent),
        });

        match ctx.post_json("/api/crawl", &payload).await {
            Ok(data) => {
                let out = json!({
                    "snapshotFile": data.get("snapshotFile").cloned().unwrap_or(Value::Null),
                    "output": data.get("output").cloned().unwrap_or(Value::Null),
                });
                debug!(result = %envelope::peek_value(&out), "crawl.site ok");
                ok_envelope(&out)
            }
            Err(e) => err_sentinel(e.to_string()),
        }
    }
}

// ============================================================================
// audit.indexability
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AuditArgs {
    urls: Vec<String>,
    user_agent: Option<String>,
}

impl AuditArgs {
    fn validate(&self) -> Result<(), String> {
        if self.urls.is_empty() {
            return Err("urls must contain at least 1 entry".to_string());
        }
        if self.urls.len() > 200 {
            return Err(format!(
                "urls must contain at most 200 entries, got {}",
                self.urls.len()
            ));
        }
        Ok(())
    }
}

/// Audits indexability signals (status, canonical, noindex, hreflang).
pub struct AuditIndexabilityTool;

#[async_trait]
impl WorkerTool for AuditIndexabilityTool {
    fn descriptor(&self) -> Tool {
        Tool {
            name: "audit.indexability".to_string(),
            description: Some(
                "Audit indexability: status, canonical, noindex, hreflang".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": { "type": "string", "format": "uri" },
                        "minItems": 1,
                        "maxItems": 200
                    },
                    "userAgent": { "type": "string" }
                },
                "required": ["urls"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, ctx: &WorkerContext, args: Map<String, Value>) -> CallToolResult {
        let args: AuditArgs = match serde_json::from_value(Value::Object(args)) {
            Ok(parsed) => parsed,
            Err(e) => return err_sentinel(format!("invalid audit.indexability arguments: {}", e)),
        };
        if let Err(msg) = args.validate() {
            return err_sentinel(msg);
        }

        let payload = json!({
            "urls": args.urls,
            "userAgent": args.user_agent.as_deref().unwrap_or(&ctx.user_agent),
        });

        match ctx.post_json("/api/audit", &payload).await {
            Ok(data) => {
                let out = json!({
                    "results": data.get("results").cloned().unwrap_or(json!([])),
                });
                debug!(result = %envelope::peek_value(&out), "audit.indexability ok");
                ok_envelope(&out)
            }
            Err(e) => err_sentinel(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::types::Content;
    use pretty_assertions::assert_eq;

    fn ctx() -> WorkerContext {
        WorkerContext::new("http://localhost:0", "test-agent")
    }

    fn result_text(result: &CallToolResult) -> &str {
        match &result.content[0] {
            Content::Text(t) => &t.text,
            _ => panic!("expected text content"),
        }
    }

    #[tokio::test]
    async fn echo_wraps_args_in_envelope() {
        let mut args = Map::new();
        args.insert("foo".to_string(), json!(1));

        let result = EchoArgsTool.call(&ctx(), args).await;
        assert_eq!(result.is_error, None);

        let extracted = envelope::extract_json(result_text(&result)).unwrap();
        assert_eq!(extracted["args"]["foo"], 1);
    }

    #[tokio::test]
    async fn crawl_rejects_unknown_fields() {
        let mut args = Map::new();
        args.insert("startUrl".to_string(), json!("https://example.com"));
        args.insert("bogus".to_string(), json!(true));

        let result = CrawlSiteTool.call(&ctx(), args).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).starts_with("ERROR: "));
    }

    #[tokio::test]
    async fn crawl_rejects_out_of_range_depth() {
        let mut args = Map::new();
        args.insert("startUrl".to_string(), json!("https://example.com"));
        args.insert("depth".to_string(), json!(7));

        let result = CrawlSiteTool.call(&ctx(), args).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("depth"));
    }

    #[tokio::test]
    async fn crawl_rejects_non_http_url() {
        let mut args = Map::new();
        args.insert("startUrl".to_string(), json!("ftp://example.com"));

        let result = CrawlSiteTool.call(&ctx(), args).await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn audit_rejects_empty_url_list() {
        let mut args = Map::new();
        args.insert("urls".to_string(), json!([]));

        let result = AuditIndexabilityTool.call(&ctx(), args).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("at least 1"));
    }

    #[tokio::test]
    async fn audit_rejects_oversized_url_list() {
        let urls: Vec<String> = (0..201).map(|i| format!("https://example.com/{i}")).collect();
        let mut args = Map::new();
        args.insert("urls".to_string(), json!(urls));

        let result = AuditIndexabilityTool.call(&ctx(), args).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("at most 200"));
    }
}
