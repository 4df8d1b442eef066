//! Transcript store (C9): JSON file persistence under a configured
//! directory, with ID-prefix lookup and a summarized listing.
//!
//! File naming convention: `{date}_{short-id}.json`
//! (e.g. `2026-02-21_a1b2c3d4.json`).

use std::fs;
use std::io::{Error, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;

use crate::transcript::DebateTranscript;

const QUERY_TRUNCATE_LEN: usize = 80;

/// Errors from [`TranscriptStore::load`]. Save and list use plain
/// `io::Result` instead — the only failure mode specific to lookup-by-prefix
/// is ambiguity, which isn't an I/O error at all.
#[derive(Debug, ThisError)]
pub enum TranscriptStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ambiguous transcript id '{prefix}': matches {matches:?}")]
    Ambiguous { prefix: String, matches: Vec<String> },
    #[error("bad arguments: id prefix '{0}' is shorter than the minimum of 4 characters")]
    BadArguments(String),
}

const MIN_PREFIX_LEN: usize = 4;

/// One row of [`TranscriptStore::list`]'s output — enough to render a
/// listing without loading every transcript's full rounds.
#[derive(Debug, Clone)]
pub struct TranscriptSummary {
    pub id: String,
    pub short_id: String,
    pub date: String,
    pub query: String,
    pub file_name: String,
    pub panel: String,
    pub synthesizer: String,
    pub tokens: u64,
    pub cost_usd: Option<f64>,
    pub rounds: usize,
    pub experiment_id: Option<String>,
}

/// A directory of saved debate transcripts.
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    /// Creates `dir` (and any missing parents) if it does not already exist.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(TranscriptStore { dir })
    }

    /// Writes `transcript` as pretty-printed JSON to
    /// `{date}_{short-id}.json` under the store directory.
    pub fn save(&self, transcript: &DebateTranscript) -> IoResult<PathBuf> {
        let date_str = transcript.created_at.format("%Y-%m-%d").to_string();
        let filename = format!("{date_str}_{}.json", transcript.short_id());
        let filepath = self.dir.join(&filename);

        let json = serde_json::to_string_pretty(transcript)
            .map_err(|err| Error::new(ErrorKind::InvalidData, err))?;
        fs::write(&filepath, json)?;
        Ok(filepath)
    }

    /// Loads a transcript by full ID or by a prefix of at least 4
    /// characters. Returns `Ok(None)` if nothing matches, `Err(Ambiguous)`
    /// if more than one transcript matches the prefix.
    pub fn load(&self, id_prefix: &str) -> Result<Option<DebateTranscript>, TranscriptStoreError> {
        if id_prefix.len() < MIN_PREFIX_LEN {
            return Err(TranscriptStoreError::BadArguments(id_prefix.to_string()));
        }
        let matches = self.find_matching_files(id_prefix)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(parse_transcript_file(&matches[0])?)),
            _ => Err(TranscriptStoreError::Ambiguous {
                prefix: id_prefix.to_string(),
                matches: matches
                    .iter()
                    .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .collect(),
            }),
        }
    }

    /// Two-pass lookup: a cheap filename-prefix match against the embedded
    /// short ID, then a full-ID verification by reading the candidate file
    /// (since a filename match against the first 8 characters does not
    /// guarantee a match against a longer supplied prefix).
    fn find_matching_files(&self, id_prefix: &str) -> IoResult<Vec<PathBuf>> {
        let short_prefix = &id_prefix[..id_prefix.len().min(8)];
        let mut matches = Vec::new();

        let entries = fs::read_dir(&self.dir)?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((_date, short_id)) = stem.split_once('_') else {
                continue;
            };
            if !short_id.starts_with(short_prefix) {
                continue;
            }
            if let Ok(transcript) = parse_transcript_file(&path) {
                if transcript.transcript_id.starts_with(id_prefix) {
                    matches.push(path);
                }
            }
        }
        Ok(matches)
    }

    /// Lists saved transcripts, most recent first by filename (which sorts
    /// chronologically since it's date-prefixed). `limit` of 0 means
    /// unlimited. Unreadable or malformed files are silently skipped rather
    /// than failing the whole listing.
    pub fn list(&self, limit: usize) -> IoResult<Vec<TranscriptSummary>> {
        let entries = fs::read_dir(&self.dir)?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();
        files.reverse();

        if limit > 0 {
            files.truncate(limit);
        }

        let mut results = Vec::new();
        for path in files {
            if let Ok(transcript) = parse_transcript_file(&path) {
                results.push(summarize(&transcript, &path));
            }
        }
        Ok(results)
    }
}

fn parse_transcript_file(path: &Path) -> IoResult<DebateTranscript> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|err| Error::new(ErrorKind::InvalidData, err))
}

fn summarize(transcript: &DebateTranscript, path: &Path) -> TranscriptSummary {
    let tokens: u64 = transcript
        .rounds
        .iter()
        .flat_map(|r| r.responses.iter())
        .chain(transcript.synthesis.iter())
        .filter_map(|r| r.token_count)
        .sum();

    TranscriptSummary {
        id: transcript.transcript_id.clone(),
        short_id: transcript.short_id().to_string(),
        date: transcript.created_at.format("%Y-%m-%d").to_string(),
        query: truncate(&transcript.query, QUERY_TRUNCATE_LEN),
        file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        panel: transcript.panel.join(", "),
        synthesizer: transcript.synthesizer_id.clone(),
        tokens,
        cost_usd: transcript.metadata.stats.as_ref().and_then(|s| s.total_cost_usd),
        rounds: transcript.rounds.len(),
        experiment_id: transcript.metadata.experiment.as_ref().map(|e| e.experiment_id.clone()),
    }
}

/// Truncates to at most `max_len` characters, appending `...` (counted
/// within the limit) when truncation actually occurs.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let keep = max_len.saturating_sub(3);
        let mut out: String = s.chars().take(keep).collect();
        out.push_str("...");
        out
    }
}
