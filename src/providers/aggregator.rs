//! Aggregator provider client: posts `{model, messages}` to a unified
//! multi-vendor chat-completions endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transcript::ModelResponse;

use super::{ChatMessage, DispatchRequest, Provider, ProviderError};

const AGGREGATOR_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const APP_REFERRER: &str = "https://github.com";
const APP_NAME: &str = "Mutual Dissent";

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

/// Client for the aggregator's OpenAI-compatible chat completions API.
pub struct AggregatorProvider {
    api_key: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl AggregatorProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        AggregatorProvider {
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            client: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Provider for AggregatorProvider {
    async fn open(&mut self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", self.api_key)
                .parse()
                .map_err(|_| ProviderError::MissingApiKey)?,
        );
        headers.insert("HTTP-Referer", APP_REFERRER.parse().unwrap());
        headers.insert("X-Title", APP_NAME.parse().unwrap());

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
        let Some(client) = &self.client else {
            return ModelResponse {
                model_id: req.model_id,
                model_alias: req.alias,
                round_number: req.round_number,
                content: String::new(),
                timestamp: chrono::Utc::now(),
                token_count: None,
                input_tokens: None,
                output_tokens: None,
                latency_ms: None,
                error: Some("aggregator client not open".to_string()),
                role: Default::default(),
                routing: None,
                analysis: Default::default(),
            };
        };

        let messages = req.request.into_messages();
        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect();
        let payload = ChatCompletionRequest {
            model: &req.model_id,
            messages: wire_messages,
        };

        let start = Instant::now();
        let send_result = client.post(AGGREGATOR_API_URL).json(&payload).send().await;

        let elapsed_ms = start.elapsed().as_millis() as u64;

        let response = match send_result {
            Ok(response) => response,
            Err(err) => {
                let message = if err.is_timeout() {
                    format!("request timed out after {}s", self.timeout.as_secs())
                } else {
                    format!("transport error: {err}")
                };
                return error_response(&req, elapsed_ms, message);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = extract_error_detail(response).await;
            return error_response(&req, elapsed_ms, format!("HTTP {status}: {detail}"));
        }

        match response.json::<ChatCompletionResponse>().await {
            Ok(parsed) => {
                let content = parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_else(|| "[failed to parse response: no choices]".to_string());
                let (token_count, input_tokens, output_tokens) = match parsed.usage {
                    Some(usage) => (usage.total_tokens, usage.prompt_tokens, usage.completion_tokens),
                    None => (None, None, None),
                };
                ModelResponse {
                    model_id: req.model_id,
                    model_alias: req.alias,
                    round_number: req.round_number,
                    content,
                    timestamp: chrono::Utc::now(),
                    token_count,
                    input_tokens,
                    output_tokens,
                    latency_ms: Some(elapsed_ms),
                    error: None,
                    role: Default::default(),
                    routing: None,
                    analysis: Default::default(),
                }
            }
            // Malformed body: a deliberate choice to surface a sentinel
            // success rather than an error — the transcript is more useful
            // with something than with a hard failure.
            Err(_) => ModelResponse {
                model_id: req.model_id,
                model_alias: req.alias,
                round_number: req.round_number,
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

fn error_response(req: &DispatchRequest, elapsed_ms: u64, message: String) -> ModelResponse {
    ModelResponse {
        model_id: req.model_id.clone(),
        model_alias: req.alias.clone(),
        round_number: req.round_number,
        content: String::new(),
        timestamp: chrono::Utc::now(),
        token_count: None,
        input_tokens: None,
        output_tokens: None,
        latency_ms: Some(elapsed_ms),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_outside_open_scope_is_an_error_response_not_a_panic() {
        let provider = AggregatorProvider::new("");
        let resp = provider
            .complete(DispatchRequest {
                model_id: "anthropic/claude-sonnet-4.5".to_string(),
                request: super::super::CompletionRequest::Prompt("hi".to_string()),
                alias: "claude".to_string(),
                round_number: 0,
            })
            .await;
        assert!(resp.is_error());
        assert_eq!(resp.content, "");
    }

    #[tokio::test]
    async fn open_without_api_key_fails() {
        let mut provider = AggregatorProvider::new("");
        assert!(matches!(provider.open().await, Err(ProviderError::MissingApiKey)));
    }
}
