//! Error taxonomy shared across the crate.
//!
//! The split matters for propagation: `ConfigError` and `ValidationError`
//! abort a run, `ExtractionError` is recovered per item with neutral
//! defaults, and `StateError` marks an internal invariant violation.

use thiserror::Error;

/// Malformed or internally-inconsistent rules configuration.
///
/// Raised once at load time and fatal: a silently bad config would corrupt
/// every subsequent score.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("inconsistent rules config: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },
}

/// The extraction oracle failed or returned unusable content.
///
/// Never batch-fatal: callers substitute neutral defaults and flag the
/// affected item as degraded.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("oracle call timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("oracle transport failure: {0}")]
    Transport(String),
    #[error("oracle returned an unusable payload: {0}")]
    Malformed(String),
}

/// A required input is missing. Fatal to the single run it belongs to.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required input: {0}")]
    MissingInput(&'static str),
}

/// An internal state-machine invariant was violated. Indicates a bug in the
/// caller, not bad data.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
