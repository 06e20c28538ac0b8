//! LLM client: the single point of entry for all Claude API calls in InkNotes.
//!
//! The model has one job here: reflowing extracted text into display lines.
//! `reflow_lines` owns that prompt, prefills the assistant turn with `{` so the
//! reply starts inside the JSON object, and retries throttled or failed calls
//! with exponential backoff. Callers treat every `LlmError` as "format locally".
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls. Hardcoded to keep formatting output stable.
pub const MODEL: &str = "claude-sonnet-4-5";
/// A 15k-character input reflowed into ~50-char lines needs headroom.
const MAX_TOKENS: u32 = 8192;
const TEMPERATURE: f32 = 0.3;
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Start of the assistant turn; the model continues the JSON object from here.
const JSON_PREFILL: &str = "{";

/// Line length band requested from the model, in characters.
pub const TARGET_MIN_CHARS: usize = 35;
pub const TARGET_MAX_CHARS: usize = 55;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM reply hit the {MAX_TOKENS}-token limit")]
    Truncated,
}

impl LlmError {
    /// Throttling, server-side failures and transport errors are worth another try.
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Parse(_) | LlmError::EmptyContent | LlmError::Truncated => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// Text of the first text block. A reply cut off by the token limit is
    /// unusable JSON, so it is reported as such rather than parsed.
    fn into_text(self) -> Result<String, LlmError> {
        if self.stop_reason.as_deref() == Some("max_tokens") {
            return Err(LlmError::Truncated);
        }
        self.content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorReply {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// What the reflow prompt asks for. A reply without `lines` reflows to nothing.
#[derive(Debug, Deserialize)]
struct ReflowReply {
    #[serde(default)]
    lines: Vec<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, api_key })
    }

    /// Asks the model to reflow `text` into lines of `TARGET_MIN_CHARS`..=`TARGET_MAX_CHARS`
    /// characters. The lines come back as the model wrote them; an empty list is
    /// a valid answer.
    pub async fn reflow_lines(&self, text: &str) -> Result<Vec<String>, LlmError> {
        let prompt = reflow_prompt(text);
        let reply = self.complete(prompts::REFLOW_SYSTEM, &prompt).await?;
        let lines = parse_reflow_reply(&reply)?;
        debug!(lines = lines.len(), "Reflow reply parsed");
        Ok(lines)
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system,
            messages: [
                Message {
                    role: "user",
                    content: prompt,
                },
                Message {
                    role: "assistant",
                    content: JSON_PREFILL,
                },
            ],
        };

        let mut attempt = 1;
        loop {
            match self.send(&body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    // 1s, 2s
                    let delay = Duration::from_millis(1000 << (attempt - 1));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "LLM call failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorReply>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: MessagesResponse = response.json().await?;
        debug!(
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "LLM call succeeded"
        );
        reply.into_text()
    }
}

fn reflow_prompt(text: &str) -> String {
    prompts::REFLOW_PROMPT_TEMPLATE
        .replace("{min_chars}", &TARGET_MIN_CHARS.to_string())
        .replace("{max_chars}", &TARGET_MAX_CHARS.to_string())
        .replace("{preserve}", prompts::PRESERVE_CONTENT_INSTRUCTION.trim())
        // raw text last so placeholders inside the document are left alone
        .replace("{raw_text}", text)
}

/// Parses the continuation of a prefilled reflow reply. A model that restates
/// the opening brace or wraps the object in code fences is tolerated.
pub(crate) fn parse_reflow_reply(reply: &str) -> Result<Vec<String>, LlmError> {
    let body = strip_json_fences(reply);
    let parsed: ReflowReply = if body.starts_with('{') {
        serde_json::from_str(body)?
    } else {
        serde_json::from_str(&format!("{JSON_PREFILL}{body}"))?
    };
    Ok(parsed.lines)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let stripped = stripped.trim_start();
    stripped
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(stripped)
}
