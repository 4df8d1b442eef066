//! Core engine for structured multi-model LLM debates.
//!
//! Given a query and a panel of model aliases, [`orchestrator::run_debate`]
//! fans the query out to every panelist, runs N rounds of cross-model
//! reflection, synthesizes a consolidated answer, and optionally scores that
//! synthesis against a ground-truth reference. [`orchestrator::run_replay`]
//! re-synthesizes (and optionally extends) an existing transcript.
//!
//! This crate has no opinion on how its embedder obtains a [`Config`],
//! persists transcripts beyond [`store::TranscriptStore`], or presents
//! progress to a user — those are deliberately left to the embedding
//! program (CLI, web backend, desktop shell).

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pricing;
pub mod prompts;
pub mod providers;
pub mod router;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod transcript;
pub mod vendor;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use orchestrator::{run_debate, run_replay, DebateOptions, ReplayOptions};
pub use providers::{ChatMessage, CompletionRequest};
pub use store::{TranscriptStore, TranscriptStoreError, TranscriptSummary};
pub use transcript::{DebateRound, DebateTranscript, ModelResponse};
pub use vendor::{Vendor, VendorRegistry};
