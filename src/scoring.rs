//! Score parser (C7): extracts numeric scores and explanation from a
//! judge's free-text response.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::transcript::GroundTruthScore;

static ACCURACY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)accuracy\s*:\s*(\S+)").expect("valid regex"));
static COMPLETENESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)completeness\s*:\s*(\S+)").expect("valid regex"));
static EXPLANATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)explanation\s*:\s*(.*)").expect("valid regex"));

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("missing ACCURACY field in judge response")]
    MissingAccuracy,
    #[error("non-numeric ACCURACY value: {0}")]
    NonNumericAccuracy(String),
    #[error("missing COMPLETENESS field in judge response")]
    MissingCompleteness,
    #[error("non-numeric COMPLETENESS value: {0}")]
    NonNumericCompleteness(String),
}

/// Extracts `(accuracy, completeness, explanation)` from a judge's response.
///
/// Case-insensitive. The explanation need not follow completeness on a new
/// line — a single-line response with all three keys is accepted, since the
/// explanation capture spans the rest of the string regardless of
/// embedded newlines.
pub fn parse_score_response(content: &str) -> Result<(i32, i32, String), ScoreError> {
    let accuracy_raw = ACCURACY_RE
        .captures(content)
        .map(|c| c[1].to_string())
        .ok_or(ScoreError::MissingAccuracy)?;
    let accuracy: i32 = accuracy_raw
        .parse()
        .map_err(|_| ScoreError::NonNumericAccuracy(accuracy_raw.clone()))?;

    let completeness_raw = COMPLETENESS_RE
        .captures(content)
        .map(|c| c[1].to_string())
        .ok_or(ScoreError::MissingCompleteness)?;
    let completeness: i32 = completeness_raw
        .parse()
        .map_err(|_| ScoreError::NonNumericCompleteness(completeness_raw.clone()))?;

    let accuracy = accuracy.clamp(1, 5);
    let completeness = completeness.clamp(1, 5);

    let explanation = EXPLANATION_RE
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    Ok((accuracy, completeness, explanation))
}

/// Build a [`GroundTruthScore`] from a judge's raw response text. On parse
/// failure, records accuracy = completeness = overall = −1 with an
/// explanatory message — a "score failed" marker is valid data, not an
/// exception. The judge alias is recorded by the caller alongside this
/// value, on `metadata.scores.judge_model`.
pub fn score_from_response(content: &str) -> GroundTruthScore {
    match parse_score_response(content) {
        Ok((accuracy, completeness, explanation)) => GroundTruthScore {
            accuracy,
            completeness,
            overall: (accuracy + completeness) as f64 / 2.0,
            explanation,
        },
        Err(_) => GroundTruthScore {
            accuracy: -1,
            completeness: -1,
            overall: -1.0,
            explanation: format!("Judge output could not be parsed: {content}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let (acc, comp, expl) =
            parse_score_response("ACCURACY: 4\nCOMPLETENESS: 5\nEXPLANATION: solid answer")
                .unwrap();
        assert_eq!(acc, 4);
        assert_eq!(comp, 5);
        assert_eq!(expl, "solid answer");
    }

    #[test]
    fn clamps_out_of_range_scores() {
        let (acc, comp, expl) =
            parse_score_response("ACCURACY: 7\nCOMPLETENESS: 0\nEXPLANATION: bad").unwrap();
        assert_eq!(acc, 5);
        assert_eq!(comp, 1);
        assert_eq!(expl, "bad");
        let overall = (acc + comp) as f64 / 2.0;
        assert_eq!(overall, 3.0);
    }

    #[test]
    fn accepts_single_line_response() {
        let (acc, comp, expl) =
            parse_score_response("accuracy: 3 completeness: 2 explanation: fine enough").unwrap();
        assert_eq!(acc, 3);
        assert_eq!(comp, 2);
        assert_eq!(expl, "fine enough");
    }

    #[test]
    fn missing_accuracy_fails() {
        assert!(matches!(
            parse_score_response("COMPLETENESS: 3\nEXPLANATION: x"),
            Err(ScoreError::MissingAccuracy)
        ));
    }

    #[test]
    fn explanation_spans_trailing_multiline_text() {
        let (_, _, expl) =
            parse_score_response("ACCURACY: 3\nCOMPLETENESS: 3\nEXPLANATION: line one\nline two")
                .unwrap();
        assert_eq!(expl, "line one\nline two");
    }

    #[test]
    fn score_from_response_falls_back_on_parse_failure() {
        let score = score_from_response("not a valid judge response");
        assert_eq!(score.accuracy, -1);
        assert_eq!(score.completeness, -1);
        assert_eq!(score.overall, -1.0);
        assert!(score.explanation.contains("not a valid judge response"));
    }
}
