//! Anthropic provider client: native Messages API, with system-message
//! extraction and content-block concatenation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transcript::ModelResponse;

use super::{ChatMessage, DispatchRequest, Provider, ProviderError};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_TOKENS: u32 = 4096;
const NO_TEXT_SENTINEL: &str = "[No text content in response]";

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

/// Client for Anthropic's native Messages API.
pub struct AnthropicProvider {
    api_key: String,
    timeout: Duration,
    max_tokens: u32,
    client: Option<reqwest::Client>,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        AnthropicProvider {
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            client: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Concatenates any system-role messages into a single `system` string
/// (joined with a blank line, preserving order), returning the remaining
/// non-system messages with their original order intact.
fn extract_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ChatMessage>) {
    let mut system_parts = Vec::new();
    let mut remaining = Vec::new();
    for message in messages {
        if message.role == "system" {
            system_parts.push(message.content);
        } else {
            remaining.push(message);
        }
    }
    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, remaining)
}

/// Concatenates text from blocks whose type is `text`, ignoring others
/// (`thinking`, `tool_use`, etc). If no text blocks are present, returns a
/// fixed sentinel — not an error.
fn extract_content(response: &MessagesResponse) -> String {
    let text: String = response
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();
    if text.is_empty() {
        NO_TEXT_SENTINEL.to_string()
    } else {
        text
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn open(&mut self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            self.api_key.parse().map_err(|_| ProviderError::MissingApiKey)?,
        );
        headers.insert("anthropic-version", ANTHROPIC_VERSION.parse().unwrap());
        headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(|_| ProviderError::MissingApiKey)?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) {
        self.client = None;
    }

    async fn complete(&self, req: DispatchRequest) -> ModelResponse {
        let model_id = req.model_id;
        let alias = req.alias;
        let round_number = req.round_number;

        let Some(client) = &self.client else {
            return blank_error(model_id, alias, round_number, None, "anthropic client not open".to_string());
        };

        let (system, remaining) = extract_system(req.request.into_messages());
        let wire_messages: Vec<WireMessage> = remaining
            .iter()
            .map(|m| WireMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect();
        let payload = MessagesRequest {
            model: &model_id,
            messages: wire_messages,
            system: system.as_deref(),
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        let send_result = client.post(ANTHROPIC_API_URL).json(&payload).send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let response = match send_result {
            Ok(response) => response,
            Err(err) => {
                let message = if err.is_timeout() {
                    format!("request timed out after {}s", self.timeout.as_secs())
                } else {
                    format!("transport error: {err}")
                };
                return blank_error(model_id, alias, round_number, Some(elapsed_ms), message);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = extract_error_detail(response).await;
            return blank_error(
                model_id,
                alias,
                round_number,
                Some(elapsed_ms),
                format!("HTTP {status}: {detail}"),
            );
        }

        match response.json::<MessagesResponse>().await {
            Ok(parsed) => {
                let content = extract_content(&parsed);
                let (total, input_tokens, output_tokens) = match parsed.usage {
                    Some(usage) => {
                        let total = match (usage.input_tokens, usage.output_tokens) {
                            (Some(i), Some(o)) => Some(i + o),
                            _ => None,
                        };
                        (total, usage.input_tokens, usage.output_tokens)
                    }
                    None => (None, None, None),
                };
                ModelResponse {
                    model_id,
                    model_alias: alias,
                    round_number,
                    content,
                    timestamp: chrono::Utc::now(),
                    token_count: total,
                    input_tokens,
                    output_tokens,
                    latency_ms: Some(elapsed_ms),
                    error: None,
                    role: Default::default(),
                    routing: None,
                    analysis: Default::default(),
                }
            }
            Err(_) => ModelResponse {
                model_id,
                model_alias: alias,
                round_number,
                content: "[failed to parse response body]".to_string(),
                timestamp: chrono::Utc::now(),
                token_count: None,
                input_tokens: None,
                output_tokens: None,
                latency_ms: Some(elapsed_ms),
                error: None,
                role: Default::default(),
                routing: None,
                analysis: Default::default(),
            },
        }
    }
}

fn blank_error(
    model_id: String,
    alias: String,
    round_number: i32,
    elapsed_ms: Option<u64>,
    message: String,
) -> ModelResponse {
    ModelResponse {
        model_id,
        model_alias: alias,
        round_number,
        content: String::new(),
        timestamp: chrono::Utc::now(),
        token_count: None,
        input_tokens: None,
        output_tokens: None,
        latency_ms: elapsed_ms,
        error: Some(message),
        role: Default::default(),
        routing: None,
        analysis: Default::default(),
    }
}

async fn extract_error_detail(response: reqwest::Response) -> String {
    match response.json::<Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| body.to_string()),
        Err(_) => "<unreadable error body>".to_string(),
    }
}
