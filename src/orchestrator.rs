//! Orchestrator (C8): runs the full multi-model debate pipeline — initial
//! round, N reflection rounds, synthesis, and optional ground-truth scoring.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::pricing::PricingCache;
use crate::prompts::{
    apply_context, format_initial, format_reflection, format_synthesis,
    format_transcript_for_synthesis, RoundSummary,
};
use crate::providers::CompletionRequest;
use crate::router::ProviderRouter;
use crate::scoring::score_from_response;
use crate::stats::compute_stats;
use crate::transcript::{
    DebateRound, DebateTranscript, ExperimentMetadata, GroundTruthScore, ModelResponse, ReplayConfig,
    ResolvedConfig, ResponseRole, RoundType, ScoresMetadata, TranscriptMetadata,
};

pub const MAX_REFLECTION_ROUNDS: u32 = 3;

/// Invoked after every completed round (initial, reflection, synthesis). A
/// callback panic is caught and logged, never propagated — a misbehaving
/// callback cannot abort the debate.
pub type RoundHook = Box<dyn Fn(&DebateRound) + Send + Sync>;

/// Per-call knobs layered on top of `Config`'s panel/synthesizer/rounds
/// defaults. Every field is optional; omitted fields fall back to `Config`.
#[derive(Default)]
pub struct DebateOptions {
    pub panel: Option<Vec<String>>,
    pub synthesizer: Option<String>,
    pub rounds: Option<u32>,
    pub ground_truth: Option<String>,
    pub panelist_context: Option<HashMap<String, String>>,
    pub experiment: Option<ExperimentMetadata>,
    pub on_round_complete: Option<RoundHook>,
    pub cancellation: Option<CancellationToken>,
}

impl DebateOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Extra knobs for [`run_replay`]. `additional_rounds` new reflection rounds
/// are appended after the copied source rounds, before synthesis.
#[derive(Default)]
pub struct ReplayOptions {
    pub synthesizer: Option<String>,
    pub additional_rounds: u32,
    pub ground_truth: Option<String>,
    pub panelist_context: Option<HashMap<String, String>>,
    pub on_round_complete: Option<RoundHook>,
    pub cancellation: Option<CancellationToken>,
}

impl ReplayOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Execute a full multi-model debate: initial round, `rounds` reflection
/// rounds, synthesis, and (if `ground_truth` is supplied) scoring.
pub async fn run_debate(query: String, config: &Config, options: DebateOptions) -> DebateTranscript {
    let panel = options.panel.unwrap_or_else(|| config.default_panel.clone());
    let synthesizer = options.synthesizer.unwrap_or_else(|| config.default_synthesizer.clone());
    let num_rounds = options.rounds.unwrap_or(config.default_rounds).min(MAX_REFLECTION_ROUNDS);

    let mut transcript = DebateTranscript::new(query.clone(), panel.clone(), synthesizer.clone(), num_rounds);
    transcript.metadata.experiment = options.experiment;

    let registry = config.build_registry();
    let mut pricing_cache = PricingCache::new(&registry);
    let mut router = ProviderRouter::new(registry, config.clone());
    router.open().await;

    pricing_cache.prefetch().await;

    let mut cancelled = is_cancelled(options.cancellation.as_ref());
    let mut prev_responses: Vec<ModelResponse> = Vec::new();

    if !cancelled {
        let initial_responses = run_initial_round(&router, &query, &panel, options.panelist_context.as_ref()).await;
        let initial_round = DebateRound {
            round_number: 0,
            round_type: RoundType::Initial,
            responses: tag_role(initial_responses, ResponseRole::Initial),
        };
        transcript.rounds.push(initial_round);
        fire_round_hook(options.on_round_complete.as_deref(), transcript.rounds.last().unwrap());
        prev_responses = transcript.rounds.last().unwrap().responses.clone();
        cancelled = is_cancelled(options.cancellation.as_ref());
    }

    for round_num in 1..=num_rounds {
        if cancelled {
            break;
        }
        let reflection_responses = run_reflection_round(
            &router,
            &query,
            &panel,
            &prev_responses,
            round_num as i32,
            options.panelist_context.as_ref(),
        )
        .await;
        let reflection_round = DebateRound {
            round_number: round_num as i32,
            round_type: RoundType::Reflection,
            responses: tag_role(reflection_responses, ResponseRole::Reflection),
        };
        transcript.rounds.push(reflection_round);
        fire_round_hook(options.on_round_complete.as_deref(), transcript.rounds.last().unwrap());
        prev_responses = transcript.rounds.last().unwrap().responses.clone();
        cancelled = is_cancelled(options.cancellation.as_ref());
    }

    if !cancelled {
        let mut synthesis = run_synthesis(&router, &query, &synthesizer, &transcript).await;
        synthesis.role = ResponseRole::Synthesis;
        let synth_round = DebateRound {
            round_number: -1,
            round_type: RoundType::Synthesis,
            responses: vec![synthesis.clone()],
        };
        fire_round_hook(options.on_round_complete.as_deref(), &synth_round);

        if let Some(ground_truth) = options.ground_truth.filter(|_| synthesis.error.is_none()) {
            let score = run_scoring(&router, &query, &synthesis.content, &ground_truth, &synthesizer).await;
            attach_ground_truth_score(
                &mut synthesis,
                &mut transcript.metadata,
                score,
                ground_truth,
                synthesizer.clone(),
            );
        }
        transcript.synthesis = Some(synthesis);
    } else {
        transcript.metadata.aborted = true;
    }

    router.close().await;

    if let Some(context) = options.panelist_context {
        transcript.metadata.panelist_context = Some(context);
    }
    transcript.metadata.resolved_config = Some(ResolvedConfig {
        default_mode: config.default_mode().to_string(),
        panel,
        synthesizer,
        rounds: num_rounds,
    });
    transcript.metadata.stats = Some(compute_stats(&transcript, &mut pricing_cache).await);

    transcript
}

/// Re-synthesize (and optionally extend) an existing transcript. Produces a
/// new transcript with a fresh ID — the source is never mutated.
pub async fn run_replay(source: &DebateTranscript, config: &Config, options: ReplayOptions) -> DebateTranscript {
    let synthesizer = options.synthesizer.clone().unwrap_or_else(|| source.synthesizer_id.clone());
    let additional = options.additional_rounds;

    let mut transcript = DebateTranscript::new(
        source.query.clone(),
        source.panel.clone(),
        synthesizer.clone(),
        source.max_rounds + additional,
    );
    transcript.rounds = source.rounds.clone();

    let registry = config.build_registry();
    let mut pricing_cache = PricingCache::new(&registry);
    let mut router = ProviderRouter::new(registry, config.clone());
    router.open().await;
    pricing_cache.prefetch().await;

    let mut cancelled = false;
    if additional > 0 {
        let round_offset = source.rounds.len() as i32;
        let mut prev_responses = source
            .rounds
            .last()
            .map(|r| r.responses.clone())
            .unwrap_or_default();

        for i in 0..additional {
            if is_cancelled(options.cancellation.as_ref()) {
                cancelled = true;
                break;
            }
            let round_num = round_offset + i as i32;
            let reflection_responses = run_reflection_round(
                &router,
                &source.query,
                &source.panel,
                &prev_responses,
                round_num,
                options.panelist_context.as_ref(),
            )
            .await;
            let reflection_round = DebateRound {
                round_number: round_num,
                round_type: RoundType::Reflection,
                responses: tag_role(reflection_responses, ResponseRole::Reflection),
            };
            transcript.rounds.push(reflection_round);
            fire_round_hook(options.on_round_complete.as_deref(), transcript.rounds.last().unwrap());
            prev_responses = transcript.rounds.last().unwrap().responses.clone();
        }
    }

    if !cancelled {
        let mut synthesis = run_synthesis(&router, &source.query, &synthesizer, &transcript).await;
        synthesis.role = ResponseRole::Synthesis;
        let synth_round = DebateRound {
            round_number: -1,
            round_type: RoundType::Synthesis,
            responses: vec![synthesis.clone()],
        };
        fire_round_hook(options.on_round_complete.as_deref(), &synth_round);

        if let Some(ground_truth) = options.ground_truth.filter(|_| synthesis.error.is_none()) {
            let score = run_scoring(&router, &source.query, &synthesis.content, &ground_truth, &synthesizer).await;
            attach_ground_truth_score(
                &mut synthesis,
                &mut transcript.metadata,
                score,
                ground_truth,
                synthesizer.clone(),
            );
        }
        transcript.synthesis = Some(synthesis);
    } else {
        transcript.metadata.aborted = true;
    }

    router.close().await;

    if let Some(context) = options.panelist_context {
        transcript.metadata.panelist_context = Some(context);
    }
    transcript.metadata.source_transcript_id = Some(source.transcript_id.clone());
    transcript.metadata.replay_config = Some(ReplayConfig {
        synthesizer_override: options.synthesizer,
        additional_rounds: additional,
    });
    transcript.metadata.stats = Some(compute_stats(&transcript, &mut pricing_cache).await);

    transcript
}

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.map(|t| t.is_cancelled()).unwrap_or(false)
}

fn tag_role(mut responses: Vec<ModelResponse>, role: ResponseRole) -> Vec<ModelResponse> {
    for response in &mut responses {
        response.role = role;
    }
    responses
}

/// Records a ground-truth score in both of its required places —
/// `synthesis.analysis.ground_truth_score` and `metadata.scores.synthesis_score`
/// — from the same value, so the two can never drift apart.
fn attach_ground_truth_score(
    synthesis: &mut ModelResponse,
    metadata: &mut TranscriptMetadata,
    score: GroundTruthScore,
    ground_truth: String,
    judge_model: String,
) {
    synthesis.analysis.insert(
        "ground_truth_score".to_string(),
        serde_json::to_value(&score).unwrap_or(serde_json::Value::Null),
    );
    metadata.scores = Some(ScoresMetadata {
        ground_truth,
        judge_model,
        synthesis_score: score,
    });
}

async fn run_initial_round(
    router: &ProviderRouter,
    query: &str,
    panel: &[String],
    panelist_context: Option<&HashMap<String, String>>,
) -> Vec<ModelResponse> {
    let base_prompt = format_initial(query);
    let requests = panel
        .iter()
        .map(|alias| {
            let prompt = apply_context(&base_prompt, panelist_context.and_then(|c| c.get(alias)).map(|s| s.as_str()));
            (alias.clone(), CompletionRequest::Prompt(prompt))
        })
        .collect();
    router.complete_panel(requests, 0).await
}

async fn run_reflection_round(
    router: &ProviderRouter,
    query: &str,
    panel: &[String],
    prev_responses: &[ModelResponse],
    round_number: i32,
    panelist_context: Option<&HashMap<String, String>>,
) -> Vec<ModelResponse> {
    // Last-response-wins for duplicate aliases: iterating in order and
    // overwriting naturally keeps the last one.
    let mut response_map: HashMap<&str, &ModelResponse> = HashMap::new();
    for response in prev_responses {
        response_map.insert(response.model_alias.as_str(), response);
    }

    let requests = panel
        .iter()
        .map(|alias| {
            let own = response_map.get(alias.as_str());
            let own_text = match own {
                Some(r) if r.error.is_none() => r.content.as_str(),
                _ => "[No response available]",
            };
            let others: Vec<(String, String)> = prev_responses
                .iter()
                .filter(|r| r.model_alias != *alias && r.error.is_none())
                .map(|r| (r.model_alias.clone(), r.content.clone()))
                .collect();

            let base_prompt = format_reflection(query, own_text, &others);
            let prompt = apply_context(&base_prompt, panelist_context.and_then(|c| c.get(alias)).map(|s| s.as_str()));
            (alias.clone(), CompletionRequest::Prompt(prompt))
        })
        .collect();

    router.complete_panel(requests, round_number).await
}

async fn run_synthesis(
    router: &ProviderRouter,
    query: &str,
    synthesizer: &str,
    transcript: &DebateTranscript,
) -> ModelResponse {
    let round_summaries: Vec<RoundSummary> = transcript
        .rounds
        .iter()
        .map(|round| RoundSummary {
            round_type: round.round_type,
            responses: round
                .responses
                .iter()
                .filter(|r| r.error.is_none())
                .map(|r| (r.model_alias.clone(), r.content.clone()))
                .collect(),
        })
        .collect();

    let formatted = format_transcript_for_synthesis(&round_summaries);
    let prompt = format_synthesis(query, &formatted);

    router
        .complete(synthesizer, CompletionRequest::Prompt(prompt), -1)
        .await
}

async fn run_scoring(
    router: &ProviderRouter,
    query: &str,
    synthesis_content: &str,
    ground_truth: &str,
    judge_alias: &str,
) -> crate::transcript::GroundTruthScore {
    let prompt = crate::prompts::format_scoring(query, ground_truth, synthesis_content);
    let response = router
        .complete(judge_alias, CompletionRequest::Prompt(prompt), -2)
        .await;
    if response.error.is_some() {
        return score_from_response("");
    }
    score_from_response(&response.content)
}

/// Fires `callback` with the completed round, catching (and logging) any
/// panic so a misbehaving callback can never abort the debate.
fn fire_round_hook(callback: Option<&RoundHook>, round: &DebateRound) {
    let Some(callback) = callback else { return };
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(round)));
    if result.is_err() {
        log::error!(
            "on_round_complete callback panicked for {:?} round {}",
            round.round_type,
            round.round_number
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn run_debate_with_no_providers_still_produces_structurally_complete_transcript() {
        let mut config = Config::default();
        config.providers.clear();
        config.default_panel = vec!["claude".to_string()];
        config.default_rounds = 1;

        let transcript = run_debate("what is rust ownership?".to_string(), &config, DebateOptions::new()).await;

        assert_eq!(transcript.rounds.len(), 2); // initial + 1 reflection
        assert!(transcript.rounds[0].responses[0].is_error());
        assert!(transcript.synthesis.is_some());
        assert!(transcript.metadata.stats.is_some());
        assert!(transcript.metadata.resolved_config.is_some());
    }

    #[tokio::test]
    async fn round_hook_fires_once_per_round_including_synthesis() {
        let mut config = Config::default();
        config.providers.clear();
        config.default_panel = vec!["claude".to_string()];
        config.default_rounds = 1;

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let mut options = DebateOptions::new();
        options.on_round_complete = Some(Box::new(move |_round| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        run_debate("q".to_string(), &config, options).await;
        // initial + 1 reflection + synthesis
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panicking_round_hook_does_not_abort_the_debate() {
        let mut config = Config::default();
        config.providers.clear();
        config.default_panel = vec!["claude".to_string()];
        config.default_rounds = 1;

        let mut options = DebateOptions::new();
        options.on_round_complete = Some(Box::new(|_round| panic!("misbehaving callback")));

        let transcript = run_debate("q".to_string(), &config, options).await;
        assert!(transcript.synthesis.is_some());
    }

    #[tokio::test]
    async fn cancellation_before_round_zero_yields_zero_rounds() {
        let mut config = Config::default();
        config.providers.clear();
        config.default_panel = vec!["claude".to_string()];
        config.default_rounds = 2;

        let token = CancellationToken::new();
        token.cancel();
        let mut options = DebateOptions::new();
        options.cancellation = Some(token);

        let transcript = run_debate("q".to_string(), &config, options).await;
        // Cancellation was already observed before the initial round was
        // ever dispatched — no partial round is emitted.
        assert_eq!(transcript.rounds.len(), 0);
        assert!(transcript.synthesis.is_none());
        assert!(transcript.metadata.aborted);
    }

    #[tokio::test]
    async fn cancellation_after_round_zero_stops_before_reflection() {
        let mut config = Config::default();
        config.providers.clear();
        config.default_panel = vec!["claude".to_string()];
        config.default_rounds = 2;

        // Cancel only once the round hook observes the initial round, so
        // round 0 itself runs to completion before cancellation is seen.
        let token = CancellationToken::new();
        let cancel_token = token.clone();
        let mut options = DebateOptions::new();
        options.cancellation = Some(token);
        options.on_round_complete = Some(Box::new(move |_round| cancel_token.cancel()));

        let transcript = run_debate("q".to_string(), &config, options).await;
        assert_eq!(transcript.rounds.len(), 1);
        assert!(transcript.synthesis.is_none());
        assert!(transcript.metadata.aborted);
    }

    #[test]
    fn attach_ground_truth_score_duplicates_identically_into_both_locations() {
        let mut synthesis = ModelResponse::placeholder("claude", -1);
        let mut metadata = TranscriptMetadata::default();
        let score = crate::scoring::score_from_response(
            "ACCURACY: 4\nCOMPLETENESS: 5\nEXPLANATION: solid",
        );

        attach_ground_truth_score(
            &mut synthesis,
            &mut metadata,
            score.clone(),
            "truth text".to_string(),
            "claude".to_string(),
        );

        let in_metadata = metadata.scores.expect("metadata.scores set");
        let in_analysis = synthesis
            .analysis
            .get("ground_truth_score")
            .expect("synthesis.analysis.ground_truth_score set");
        let in_analysis: crate::transcript::GroundTruthScore =
            serde_json::from_value(in_analysis.clone()).unwrap();

        assert_eq!(in_metadata.synthesis_score.accuracy, in_analysis.accuracy);
        assert_eq!(in_metadata.synthesis_score.completeness, in_analysis.completeness);
        assert_eq!(in_metadata.synthesis_score.overall, in_analysis.overall);
        assert_eq!(in_metadata.synthesis_score.accuracy, score.accuracy);
        assert_eq!(in_metadata.ground_truth, "truth text");
        assert_eq!(in_metadata.judge_model, "claude");
    }

    #[tokio::test]
    async fn replay_copies_source_rounds_and_re_synthesizes() {
        let mut config = Config::default();
        config.providers.clear();

        let source = DebateTranscript::new(
            "q".to_string(),
            vec!["claude".to_string()],
            "claude".to_string(),
            1,
        );

        let transcript = run_replay(&source, &config, ReplayOptions::new()).await;
        assert_eq!(transcript.rounds.len(), 0);
        assert!(transcript.synthesis.is_some());
        assert_eq!(
            transcript.metadata.source_transcript_id.as_deref(),
            Some(source.transcript_id.as_str())
        );
        assert_ne!(transcript.transcript_id, source.transcript_id);
    }
}
