//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = SpvocabError> = std::result::Result<T, E>;

/// Domain-specific error describing failures of the vocabulary training pipeline.
///
/// Every variant is fatal: the pipeline is an all-or-nothing batch job and the
/// first error aborts training.  Soft conditions (over-long lines, reserved
/// markers in the corpus, sentences normalising to nothing) are counted in
/// [`crate::metrics::LoadStats`] instead.
#[derive(Debug, Error)]
pub enum SpvocabError {
    /// Training configuration failed validation or meta piece allocation.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        /// Configuration field responsible for the failure.
        field: &'static str,
        /// Human readable description of the violated constraint.
        reason: String,
    },
    /// A corpus line could not be parsed in the configured input format.
    #[error("malformed corpus line {line} in {path:?}: {reason}")]
    CorpusFormat {
        /// Source file containing the malformed line.
        path: PathBuf,
        /// One-based line number within the source.
        line: usize,
        /// Description of the format violation.
        reason: String,
    },
    /// The normaliser produced output that violates a structural invariant.
    #[error("normalization invariant violated: {0}")]
    NormalizationInvariant(String),
    /// The configured vocabulary cannot hold the required alphabet and meta pieces.
    #[error("vocabulary too small: {0}")]
    VocabularyTooSmall(String),
    /// Final piece assembly or artifact (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<bincode::Error> for SpvocabError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for SpvocabError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl SpvocabError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Helper constructor for configuration errors naming the offending field.
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
