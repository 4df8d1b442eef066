//! Provider clients (C3): one per vendor, normalizing wire-format
//! differences to a common [`crate::transcript::ModelResponse`] shape.

pub mod aggregator;
pub mod anthropic;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

use crate::transcript::ModelResponse;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("both or neither of messages/prompt were supplied")]
    BadArguments,
}

/// A single chat message in OpenAI-compatible `{role, content}` form.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Exactly one of `Messages` or `Prompt` describes a single completion
/// request — the enum makes the "both or neither" `BadArguments` case
/// structurally unrepresentable at the call site.
#[derive(Debug, Clone)]
pub enum CompletionRequest {
    Messages(Vec<ChatMessage>),
    Prompt(String),
}

impl CompletionRequest {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            CompletionRequest::Messages(messages) => messages,
            CompletionRequest::Prompt(prompt) => vec![ChatMessage::user(prompt)],
        }
    }
}

/// One request in a parallel fan-out: the model ID to call, the request
/// body, the alias for logging/response-stamping, and the round number.
pub struct DispatchRequest {
    pub model_id: String,
    pub request: CompletionRequest,
    pub alias: String,
    pub round_number: i32,
}

/// The common contract every vendor provider implements.
///
/// `open`/`close` are explicit (no implicit reference counting or `Drop`
/// teardown) so the router can release resources identically on the
/// ordinary-completion and cancellation paths.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Create a connection pool and install auth headers. Operations issued
    /// outside an open scope fail with `NotOpen` at the router level.
    async fn open(&mut self) -> Result<(), ProviderError>;

    /// Drain the connection pool.
    async fn close(&mut self);

    /// Issue a single completion call. Never returns `Err` for
    /// transport/parse failures — those are captured as a populated
    /// `error` field on the returned response.
    async fn complete(&self, req: DispatchRequest) -> ModelResponse;

    /// Fan out a batch of requests concurrently, preserving input order in
    /// the output `Vec`. The default implementation joins every request's
    /// future rather than racing them, so no dispatch is ever left unjoined.
    async fn complete_parallel(&self, requests: Vec<DispatchRequest>) -> Vec<ModelResponse> {
        join_all(requests.into_iter().map(|req| self.complete(req))).await
    }
}
