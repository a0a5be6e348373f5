//! Error types for Sheaf Core.

use thiserror::Error;

/// Result type alias for sheaf operations.
pub type Result<T> = std::result::Result<T, SheafError>;

/// Errors that can occur during beam search decoding.
#[derive(Error, Debug)]
pub enum SheafError {
    /// Hypothesis sequences are structurally inconsistent.
    #[error("malformed hypothesis: {0}")]
    MalformedHypothesis(String),

    /// Scoring input cannot be normalized.
    #[error("degenerate scoring input: {0}")]
    DegenerateScoring(String),

    /// Invalid search configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Search produced no rankable hypotheses.
    #[error("search error: {0}")]
    Search(String),

    /// The decode-step capability failed or violated its contract.
    #[error("model error: {0}")]
    Model(String),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
