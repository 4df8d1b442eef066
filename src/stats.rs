//! Stats aggregator (C10): rolls a completed transcript's responses up into
//! per-model and overall token/cost totals.

use crate::pricing::{compute_response_cost, PricingCache};
use crate::transcript::{DebateStats, DebateTranscript, ModelResponse, ModelStats};

/// Walk every response in the transcript (all rounds plus synthesis, if
/// present) and accumulate token and cost totals.
///
/// A model's `cost_usd` is `Some` only if at least one of its responses
/// yielded a computable cost — absence propagates per-model, not just
/// globally, so an unpriced model never silently reports `0.0`.
pub async fn compute_stats(transcript: &DebateTranscript, pricing: &mut PricingCache) -> DebateStats {
    let mut stats = DebateStats::default();
    let mut has_any_cost = false;

    for response in all_responses(transcript) {
        stats.total_tokens += response.token_count.unwrap_or(0);

        let entry = stats.per_model.entry(response.model_alias.clone()).or_default();
        entry.tokens += response.token_count.unwrap_or(0);
        entry.input_tokens += response.input_tokens.unwrap_or(0);
        entry.output_tokens += response.output_tokens.unwrap_or(0);
        entry.calls += 1;

        let model_pricing = pricing.get_pricing(&response.model_id).await;
        if let Some(cost) = compute_response_cost(response, model_pricing.as_ref()) {
            entry.cost_usd = Some(entry.cost_usd.unwrap_or(0.0) + cost);
            stats.total_cost_usd = Some(stats.total_cost_usd.unwrap_or(0.0) + cost);
            has_any_cost = true;
        }
    }

    if !has_any_cost {
        stats.total_cost_usd = None;
    }
    stats
}

fn all_responses(transcript: &DebateTranscript) -> impl Iterator<Item = &ModelResponse> {
    transcript
        .rounds
        .iter()
        .flat_map(|round| round.responses.iter())
        .chain(transcript.synthesis.iter())
}
