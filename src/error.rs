//! Error types raised to callers.
//!
//! Per the error taxonomy, only a handful of failure kinds ever surface as
//! an `Err`: the rest (transport errors, malformed bodies, missing
//! providers, unparseable scores, pricing unavailability, callback panics,
//! cancellation) are captured as data on a [`crate::transcript::ModelResponse`]
//! or the transcript itself, not propagated as exceptions.

use thiserror::Error;

/// Errors raised to the caller. Everything else in the system's error
/// taxonomy is locally recovered and shows up as data, not as `Err`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("unknown model alias: {0}")]
    UnknownAlias(String),

    #[error("provider used outside its open scope: {0}")]
    NotOpen(String),

    #[error("ambiguous transcript id '{prefix}': matches {matches:?}")]
    Ambiguous { prefix: String, matches: Vec<String> },
}

pub type CoreResult<T> = Result<T, CoreError>;
