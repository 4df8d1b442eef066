//! Transcript model (C6): the canonical in-memory and on-disk representation
//! of a debate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::vendor::Vendor;

/// Routing decision attached to every response, documenting which vendor,
/// mode, and path were used — even on error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub vendor: Vendor,
    pub mode: RoutingMode,
    pub via_aggregator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Auto,
    Direct,
    Aggregator,
}

/// The role a response played within the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseRole {
    Initial,
    Reflection,
    Synthesis,
    Scoring,
    #[serde(rename = "")]
    Empty,
}

impl Default for ResponseRole {
    fn default() -> Self {
        ResponseRole::Empty
    }
}

/// The unit of output from a single model call.
///
/// Any numeric field may be absent if the vendor did not report it — absence
/// is a first-class value, never a sentinel zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model_id: String,
    pub model_alias: String,
    pub round_number: i32,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub token_count: Option<u64>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub role: ResponseRole,
    #[serde(default)]
    pub routing: Option<RoutingDecision>,
    #[serde(default)]
    pub analysis: HashMap<String, Value>,
}

impl ModelResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Construct a placeholder response standing in for a panel member that
    /// did not produce output in the previous round (missing or errored),
    /// used when building a reflection prompt's "own previous response".
    pub fn placeholder(alias: &str, round_number: i32) -> ModelResponse {
        ModelResponse {
            model_id: String::new(),
            model_alias: alias.to_string(),
            round_number,
            content: String::new(),
            timestamp: Utc::now(),
            token_count: None,
            input_tokens: None,
            output_tokens: None,
            latency_ms: None,
            error: Some("no response available from previous round".to_string()),
            role: ResponseRole::Empty,
            routing: None,
            analysis: HashMap::new(),
        }
    }
}

/// One of `initial`, `reflection`, `synthesis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundType {
    Initial,
    Reflection,
    Synthesis,
}

/// A round number, a round type, and an ordered sequence of responses in
/// panel order (one entry per panel member for initial/reflection; one entry
/// for synthesis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRound {
    pub round_number: i32,
    pub round_type: RoundType,
    pub responses: Vec<ModelResponse>,
}

/// A ground-truth score: accuracy, completeness, their mean, and the
/// judge's explanation. The same value is attached, structurally
/// identical, both under `metadata.scores.synthesis_score` and under
/// `synthesis.analysis.ground_truth_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthScore {
    pub accuracy: i32,
    pub completeness: i32,
    pub overall: f64,
    pub explanation: String,
}

/// The `metadata.scores` object: the reference text the synthesis was
/// judged against, which alias acted as judge, and the score itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoresMetadata {
    pub ground_truth: String,
    pub judge_model: String,
    pub synthesis_score: GroundTruthScore,
}

/// Replay provenance recorded on a replayed transcript's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub synthesizer_override: Option<String>,
    pub additional_rounds: u32,
}

/// Per-model usage totals produced by the stats aggregator (C10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStats {
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls: u32,
    pub cost_usd: Option<f64>,
}

/// The full summary produced by the stats aggregator (C10) over a completed
/// transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebateStats {
    pub total_tokens: u64,
    pub per_model: HashMap<String, ModelStats>,
    pub total_cost_usd: Option<f64>,
}

/// Optional experiment provenance, round-tripping unchanged through
/// save/load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    pub experiment_id: String,
    #[serde(default)]
    pub source_tool: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub finding_ref: Option<String>,
}

/// Resolved configuration snapshot recorded at debate start, so a transcript
/// is self-describing about the routing policy and panel it was produced
/// under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub default_mode: String,
    pub panel: Vec<String>,
    pub synthesizer: String,
    pub rounds: u32,
}

/// Fixed, strongly-typed metadata sub-keys this core itself writes, per the
/// "replaces string-keyed metadata maps" design note. Unrecognized keys from
/// an older or foreign transcript are preserved in `extra` via
/// `#[serde(flatten)]` so round-tripping never silently drops data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    #[serde(default)]
    pub resolved_config: Option<ResolvedConfig>,
    #[serde(default)]
    pub panelist_context: Option<HashMap<String, String>>,
    #[serde(default)]
    pub stats: Option<DebateStats>,
    #[serde(default)]
    pub scores: Option<ScoresMetadata>,
    #[serde(default)]
    pub experiment: Option<ExperimentMetadata>,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default)]
    pub source_transcript_id: Option<String>,
    #[serde(default)]
    pub replay_config: Option<ReplayConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A globally unique debate transcript: query, panel, synthesizer, rounds,
/// synthesis, and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTranscript {
    pub transcript_id: String,
    pub query: String,
    pub panel: Vec<String>,
    pub synthesizer_id: String,
    pub max_rounds: u32,
    pub rounds: Vec<DebateRound>,
    pub synthesis: Option<ModelResponse>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TranscriptMetadata,
}

impl DebateTranscript {
    /// Begin a new transcript with a fresh UUID and the current time.
    pub fn new(query: String, panel: Vec<String>, synthesizer_id: String, max_rounds: u32) -> Self {
        DebateTranscript {
            transcript_id: Uuid::new_v4().to_string(),
            query,
            panel,
            synthesizer_id,
            max_rounds,
            rounds: Vec::new(),
            synthesis: None,
            created_at: Utc::now(),
            metadata: TranscriptMetadata::default(),
        }
    }

    /// First 8 hex characters of the transcript ID, used in filenames and
    /// prefix lookups. Uniqueness is checked at lookup time, not write time
    /// — two transcripts may legally share a short-ID prefix.
    pub fn short_id(&self) -> &str {
        &self.transcript_id[..8.min(self.transcript_id.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transcript_has_no_rounds_and_fresh_id() {
        let t = DebateTranscript::new(
            "query".to_string(),
            vec!["claude".to_string()],
            "claude".to_string(),
            1,
        );
        assert!(t.rounds.is_empty());
        assert!(t.synthesis.is_none());
        assert_eq!(t.short_id().len(), 8);
    }

    #[test]
    fn round_trip_through_json_preserves_shape() {
        let mut t = DebateTranscript::new(
            "query".to_string(),
            vec!["a".to_string(), "b".to_string()],
            "a".to_string(),
            1,
        );
        t.rounds.push(DebateRound {
            round_number: 0,
            round_type: RoundType::Initial,
            responses: vec![ModelResponse {
                model_id: "m".to_string(),
                model_alias: "a".to_string(),
                round_number: 0,
                content: "hi".to_string(),
                timestamp: Utc::now(),
                token_count: Some(10),
                input_tokens: Some(4),
                output_tokens: Some(6),
                latency_ms: Some(120),
                error: None,
                role: ResponseRole::Initial,
                routing: Some(RoutingDecision {
                    vendor: Vendor::Anthropic,
                    mode: RoutingMode::Auto,
                    via_aggregator: false,
                }),
                analysis: HashMap::new(),
            }],
        });

        let json = serde_json::to_string(&t).unwrap();
        let back: DebateTranscript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transcript_id, t.transcript_id);
        assert_eq!(back.rounds.len(), 1);
        assert_eq!(back.rounds[0].responses[0].token_count, Some(10));
    }

    #[test]
    fn missing_optional_fields_deserialize_with_defaults() {
        let old_style = serde_json::json!({
            "model_id": "m",
            "model_alias": "a",
            "round_number": 0,
            "content": "hi"
        });
        let resp: ModelResponse = serde_json::from_value(old_style).unwrap();
        assert_eq!(resp.role, ResponseRole::Empty);
        assert!(resp.routing.is_none());
        assert!(resp.analysis.is_empty());
        assert!(resp.input_tokens.is_none());
    }
}
