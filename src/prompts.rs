//! Prompt assembly (C5): four templates, each a pure function of structured
//! inputs. The literal English wording here is this implementation's own —
//! only the parameter shapes and the labelling/section-header conventions
//! are load-bearing.

use crate::transcript::RoundType;

/// Wraps the user's query in a "you are on a multi-model panel" frame.
pub fn format_initial(query: &str) -> String {
    format!(
        "You are participating in a multi-model panel discussion. Answer the \
following query to the best of your ability. Be thorough but concise.\n\n\
Query: {query}"
    )
}

/// Builds a reflection-round prompt from the model's own previous response
/// and its peers' responses (peers only, errored peers already filtered out
/// by the caller).
pub fn format_reflection(
    query: &str,
    own_response: &str,
    other_responses: &[(String, String)],
) -> String {
    let formatted_others = other_responses
        .iter()
        .map(|(alias, text)| format!("[{alias}]:\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You previously answered a query as part of a multi-model panel. Below \
is your original response, followed by how other models on the panel \
responded.\n\n\
Your previous response:\n{own_response}\n\n\
Other panel members' responses:\n{formatted_others}\n\n\
Reflect on the other responses. Where do you agree? Where do you disagree? \
What did they identify that you missed? What did you get right that they \
missed? Provide your refined answer to the original query.\n\n\
Original query: {query}"
    )
}

/// Receives the query and a pre-rendered transcript string and produces the
/// final synthesis prompt.
pub fn format_synthesis(query: &str, formatted_transcript: &str) -> String {
    format!(
        "You are the designated synthesizer for a multi-model panel \
discussion. Below is the full debate transcript including initial responses \
and any reflection rounds from all panel members.\n\n\
Original query: {query}\n\n\
{formatted_transcript}\n\n\
Synthesize the strongest elements from all panel members into a single, \
well-reasoned response. Note where the panel reached consensus and where \
significant disagreements remain. Do not simply concatenate — produce a \
coherent, unified answer."
    )
}

/// Instructs a judge model to score a synthesis against a ground-truth
/// reference, in the fixed line-based format the score parser expects.
pub fn format_scoring(query: &str, ground_truth: &str, synthesis: &str) -> String {
    format!(
        "You are evaluating the quality of an AI-generated answer against a \
known correct reference answer.\n\n\
Original query: {query}\n\n\
Reference answer (ground truth):\n{ground_truth}\n\n\
Response to evaluate:\n{synthesis}\n\n\
Score the response on two dimensions, each from 1 to 5:\n\n\
- Accuracy (1-5): how factually correct is the response compared to the \
reference? 5 = fully correct, 1 = fundamentally wrong.\n\
- Completeness (1-5): how much of the reference answer's key information \
does the response cover? 5 = covers everything, 1 = misses almost all \
points.\n\n\
Respond in EXACTLY this format (no other text):\n\
ACCURACY: <score>\n\
COMPLETENESS: <score>\n\
EXPLANATION: <1-3 sentence explanation of the scores>"
    )
}

/// Prepend per-panelist retrieval-augmentation context to an assembled
/// prompt, separated by a blank line. A no-op if `context` is `None`.
pub fn apply_context(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\n{prompt}"),
        _ => prompt.to_string(),
    }
}

/// Summary of one round's surviving responses, used to build the synthesis
/// transcript rendering.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round_type: RoundType,
    pub responses: Vec<(String, String)>,
}

fn round_type_label(round_type: RoundType) -> &'static str {
    match round_type {
        RoundType::Initial => "INITIAL",
        RoundType::Reflection => "REFLECTION",
        RoundType::Synthesis => "SYNTHESIS",
    }
}

/// Renders all rounds, in order, into a single transcript string: a section
/// header per round and a labelled block per surviving response.
pub fn format_transcript_for_synthesis(rounds: &[RoundSummary]) -> String {
    rounds
        .iter()
        .map(|round| {
            let header = format!("=== {} ROUND ===", round_type_label(round.round_type));
            let entries = round
                .responses
                .iter()
                .map(|(alias, text)| format!("[{alias}]:\n{text}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("{header}\n\n{entries}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::parse_score_response;

    #[test]
    fn initial_prompt_contains_query() {
        let prompt = format_initial("what is rust ownership?");
        assert!(prompt.contains("what is rust ownership?"));
    }

    #[test]
    fn reflection_prompt_labels_peers_by_alias() {
        let prompt = format_reflection(
            "q",
            "my answer",
            &[("gpt".to_string(), "their answer".to_string())],
        );
        assert!(prompt.contains("[gpt]:\ntheir answer"));
        assert!(prompt.contains("my answer"));
    }

    #[test]
    fn reflection_prompt_with_no_peers_has_empty_section() {
        let prompt = format_reflection("q", "my answer", &[]);
        assert!(prompt.contains("Other panel members' responses:\n\n"));
    }

    #[test]
    fn context_is_prepended_with_blank_line() {
        let prompt = apply_context("body", Some("background info"));
        assert_eq!(prompt, "background info\n\nbody");
    }

    #[test]
    fn context_absent_is_passthrough() {
        let prompt = apply_context("body", None);
        assert_eq!(prompt, "body");
    }

    #[test]
    fn transcript_rendering_has_section_headers_per_round() {
        let rounds = vec![
            RoundSummary {
                round_type: RoundType::Initial,
                responses: vec![("a".to_string(), "resp-a".to_string())],
            },
            RoundSummary {
                round_type: RoundType::Reflection,
                responses: vec![("a".to_string(), "resp-a-2".to_string())],
            },
        ];
        let rendered = format_transcript_for_synthesis(&rounds);
        assert!(rendered.contains("=== INITIAL ROUND ==="));
        assert!(rendered.contains("=== REFLECTION ROUND ==="));
        assert!(rendered.contains("resp-a-2"));
    }

    #[test]
    fn scoring_prompt_round_trips_through_parser() {
        let prompt = format_scoring("q", "truth", "synth text");
        assert!(prompt.contains("ACCURACY"));
        // A judge replying in the template's documented format parses back
        // to the same numeric triple.
        let reply = "ACCURACY: 4\nCOMPLETENESS: 5\nEXPLANATION: good match";
        let (acc, comp, expl) = parse_score_response(reply).unwrap();
        assert_eq!((acc, comp, expl.as_str()), (4, 5, "good match"));
        let _ = prompt;
    }
}
