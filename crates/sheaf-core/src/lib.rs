//! # Sheaf Core
//!
//! Beam search decoding core for sequence models.
//!
//! This crate provides:
//! - **Hypotheses** as immutable-append value types, so branches of the
//!   search share history without aliasing
//! - **Scoring policies**: plain average log probability, and a "smart"
//!   linguistic heuristic with sentence-start weighting, pronoun penalty
//!   and repetition/coverage penalties
//! - **Beam search driver** over an abstract decode-step capability
//! - **Scripted decoder** for deterministic decoding in tests

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod decoder;
pub mod error;
pub mod search;

pub use error::{Result, SheafError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::decoder::{DecodeStep, ScriptedDecoder, StepExpansion, StepOutput, TokenId};
    pub use crate::error::{Result, SheafError};
    pub use crate::search::{
        BeamSearch, BeamSearchConfig, Hypothesis, LinguisticIds, ScoreMode, Scorer, SearchInput,
        SearchResult,
    };
}
