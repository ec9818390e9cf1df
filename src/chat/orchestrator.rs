//! Chat orchestration: the tool-use loop between model and worker.
//!
//! Each request runs up to [`MAX_TOOL_ROUNDS`] model rounds. The first round
//! offers tools freely; once any tool has returned, tool choice switches to
//! `none` so the model must answer from the results instead of calling tools
//! forever. A tool failure aborts the whole request; a refusal-looking final
//! answer with a crawl payload in hand triggers the deterministic fallback.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::bridge::WorkerBridge;
use crate::config::Config;
use crate::envelope;
use crate::model::{
    AnthropicClient, Block, CompletionRequest, Message, ReasoningClient, ToolChoice,
};

use super::catalog;
use super::fallback;

/// Maximum number of model rounds per request.
pub const MAX_TOOL_ROUNDS: usize = 3;

const MAX_COMPLETION_TOKENS: u32 = 2000;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a technical SEO assistant.
If the user asks about crawling, sitemaps, indexability, canonicals, noindex or hreflang:
1) Use 'crawl_site' or 'audit_indexability'.
2) If you receive a RESULT_JSON block, ASSUME the crawl succeeded and ANSWER with clear conclusions.
3) Do not apologize and do not retry tools unless the tool_result starts with 'ERROR:'.";

const TOOL_RESULT_GUIDANCE: &str = "\
Use the RESULT_JSON above to answer EXACTLY what the user asked.
If the user asked for sitemap URLs without internal links, compute and list those URLs from the JSON.
Do not apologize or claim the crawl failed when a RESULT_JSON is present.";

const STEP_LIMIT_REPLY: &str = "We reached the tool-step limit. \
Do you want me to summarize the findings from the previous RESULT_JSON?";

/// Role of an inbound chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// An inbound chat request: the full conversation so far.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Summary of one tool invocation performed during a request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallSummary {
    pub name: String,
    pub args: Value,
    pub ok: bool,
}

/// Outcome of a chat request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallSummary>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    /// HTTP-style status for the presentation layer, not serialized.
    #[serde(skip)]
    pub status: u16,
}

impl ChatResponse {
    fn reply(text: impl Into<String>, tool_calls: Vec<ToolCallSummary>) -> Self {
        Self {
            ok: true,
            reply: Some(text.into()),
            error: None,
            tool_calls,
            fallback: false,
            status: 200,
        }
    }

    fn fallback_reply(text: impl Into<String>, tool_calls: Vec<ToolCallSummary>) -> Self {
        Self {
            fallback: true,
            ..Self::reply(text, tool_calls)
        }
    }

    fn failure(status: u16, message: impl Into<String>, tool_calls: Vec<ToolCallSummary>) -> Self {
        Self {
            ok: false,
            reply: None,
            error: Some(message.into()),
            tool_calls,
            fallback: false,
            status,
        }
    }
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://[^\s)]+").expect("valid url regex"))
}

/// First URL mentioned in a text, if any.
fn infer_url(text: &str) -> Option<String> {
    url_re().find(text).map(|m| m.as_str().to_string())
}

/// Fill in missing crawl arguments on the client side.
///
/// The model sometimes emits a bare `crawl_site` call; the start URL is then
/// recovered from the latest user message, and depth/page caps get their
/// defaults so the transcript records the effective values.
fn complete_crawl_args(args: &mut Map<String, Value>, latest_user: &str) {
    let has_start_url = args.get("startUrl").map(Value::is_string).unwrap_or(false);
    if !has_start_url {
        if let Some(url) = infer_url(latest_user) {
            args.insert("startUrl".to_string(), Value::String(url));
        }
    }
    if !args.get("depth").map(Value::is_number).unwrap_or(false) {
        args.insert("depth".to_string(), Value::from(2));
    }
    if !args.get("maxPages").map(Value::is_number).unwrap_or(false) {
        args.insert("maxPages".to_string(), Value::from(500));
    }
}

/// Orchestrates the model/worker conversation for one chat request.
pub struct ChatOrchestrator {
    model: Arc<dyn ReasoningClient>,
    bridge: Arc<WorkerBridge>,
    model_id: String,
}

impl ChatOrchestrator {
    pub fn new(model: Arc<dyn ReasoningClient>, bridge: Arc<WorkerBridge>, model_id: String) -> Self {
        Self {
            model,
            bridge,
            model_id,
        }
    }

    /// Build an orchestrator from configuration. Requires an API key.
    pub fn from_config(config: &Config, bridge: Arc<WorkerBridge>) -> Result<Self, String> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .ok_or_else(|| "ANTHROPIC_API_KEY is not set".to_string())?;
        Ok(Self::new(
            Arc::new(AnthropicClient::new(api_key)),
            bridge,
            config.anthropic_model.clone(),
        ))
    }

    /// Run one chat request to completion.
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        if request.messages.is_empty() {
            return ChatResponse::failure(400, "messages must contain at least one entry", vec![]);
        }

        let system = request
            .messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let latest_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut history: Vec<Message> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| match m.role {
                ChatRole::Assistant => Message::assistant(vec![Block::text(&m.content)]),
                _ => Message::user_text(&m.content),
            })
            .collect();

        let mut tool_calls: Vec<ToolCallSummary> = Vec::new();
        let mut any_tool_returned = false;
        let mut last_tool_json: Option<Value> = None;

        for round in 0..MAX_TOOL_ROUNDS {
            let completion = CompletionRequest {
                model: self.model_id.clone(),
                max_tokens: MAX_COMPLETION_TOKENS,
                system: Some(system.clone()),
                messages: history.clone(),
                tools: catalog::specs(),
                tool_choice: Some(if any_tool_returned {
                    ToolChoice::None
                } else {
                    ToolChoice::Auto
                }),
            };

            let response = match self.model.create(completion).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(round, "model call failed: {}", e);
                    return ChatResponse::failure(502, e.to_string(), tool_calls);
                }
            };

            debug!(
                round,
                blocks = response.content.len(),
                stop_reason = ?response.stop_reason,
                "model round complete"
            );

            history.push(Message::assistant(response.content.clone()));

            let tool_uses: Vec<(String, String, Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if tool_uses.is_empty() {
                let final_text = response.joined_text().trim().to_string();

                if fallback::looks_like_refusal(&final_text) {
                    if let Some(payload) = &last_tool_json {
                        let orphans = fallback::compute_sitemap_orphans(payload);
                        info!(
                            orphans = orphans.len(),
                            payload = %envelope::peek_value(payload),
                            "refusal detected, using deterministic fallback"
                        );
                        return ChatResponse::fallback_reply(
                            fallback::render_fallback_reply(&orphans),
                            tool_calls,
                        );
                    }
                }

                return ChatResponse::reply(final_text, tool_calls);
            }

            let mut result_blocks: Vec<Block> = Vec::new();
            for (tool_use_id, public_name, input) in tool_uses {
                let Some(internal) = catalog::internal_name(&public_name) else {
                    warn!(tool = %public_name, "model requested a tool with no worker mapping");
                    return ChatResponse::failure(
                        500,
                        format!("tool '{public_name}' has no worker mapping"),
                        tool_calls,
                    );
                };

                let mut args = match input {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                if public_name == catalog::CRAWL_SITE {
                    complete_crawl_args(&mut args, &latest_user);
                }

                let args_peek = envelope::peek_value(&Value::Object(args.clone()));
                info!(tool = internal, args = %args_peek, "invoking tool");
                match self.bridge.invoke(internal, args.clone()).await {
                    Ok(payload) => {
                        result_blocks
                            .push(Block::tool_result(&tool_use_id, envelope::wrap_json(&payload)));
                        tool_calls.push(ToolCallSummary {
                            name: public_name,
                            args: Value::Object(args),
                            ok: true,
                        });
                        last_tool_json = Some(payload);
                    }
                    Err(e) => {
                        tool_calls.push(ToolCallSummary {
                            name: public_name,
                            args: Value::Object(args),
                            ok: false,
                        });
                        warn!(tool = internal, "tool failed: {}", e);
                        return ChatResponse::failure(
                            502,
                            format!("tool {internal} failed: {e}"),
                            tool_calls,
                        );
                    }
                }
            }

            history.push(Message::user(result_blocks));
            history.push(Message::user(vec![Block::text(TOOL_RESULT_GUIDANCE)]));
            any_tool_returned = true;
        }

        // Step limit reached: hand control back without a call summary so the
        // client does not re-render stale tool activity.
        ChatResponse::reply(STEP_LIMIT_REPLY, vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infer_url_finds_first_url_case_insensitively() {
        assert_eq!(
            infer_url("please crawl HTTPS://Example.com/shop) thanks"),
            Some("HTTPS://Example.com/shop".to_string())
        );
        assert_eq!(infer_url("no links here"), None);
    }

    #[test]
    fn crawl_args_are_completed_from_user_message() {
        let mut args = Map::new();
        complete_crawl_args(&mut args, "crawl https://example.com/foo please");
        assert_eq!(args["startUrl"], "https://example.com/foo");
        assert_eq!(args["depth"], 2);
        assert_eq!(args["maxPages"], 500);
    }

    #[test]
    fn crawl_args_preserve_explicit_values() {
        let mut args = Map::new();
        args.insert("startUrl".to_string(), json!("https://given.example"));
        args.insert("depth".to_string(), json!(4));
        complete_crawl_args(&mut args, "crawl https://other.example");
        assert_eq!(args["startUrl"], "https://given.example");
        assert_eq!(args["depth"], 4);
        assert_eq!(args["maxPages"], 500);
    }

    #[test]
    fn response_serialization_skips_empty_fields() {
        let response = ChatResponse::reply("done", vec![]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({ "ok": true, "reply": "done" }));

        let response = ChatResponse::fallback_reply(
            "list",
            vec![ToolCallSummary {
                name: "crawl_site".to_string(),
                args: json!({}),
                ok: true,
            }],
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["fallback"], true);
        assert_eq!(json["toolCalls"][0]["name"], "crawl_site");
    }
}
