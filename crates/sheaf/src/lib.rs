//! # Sheaf
//!
//! Beam search decoding engine for sequence-to-sequence generation.
//!
//! Sheaf turns a model's step-wise token predictions into a single best
//! output sequence:
//! - **Immutable hypotheses**: branching search without aliasing
//! - **Smart scoring**: sentence-start weighting, pronoun penalty,
//!   repetition and coverage penalties
//! - **Abstract decode step**: any model backend conforms structurally
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheaf::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let decoder = Decoder::builder()
//!         .search(BeamSearchConfig::default())
//!         .ids(vocab_ids)
//!         .build()?;
//!
//!     let result = decoder.decode_one(&mut model, &input)?;
//!     println!("score: {}", result.score);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use sheaf_core::*;

mod engine;

pub use engine::{DecodeSummary, Decoder, DecoderBuilder, DecoderConfig, InputSource};

/// Commonly used types.
pub mod prelude {
    pub use crate::engine::{DecodeSummary, Decoder, DecoderBuilder, DecoderConfig, InputSource};
    pub use crate::{
        decoder::{DecodeStep, ScriptedDecoder, StepExpansion, StepOutput, TokenId},
        error::{Result, SheafError},
        search::{
            BeamSearch, BeamSearchConfig, Hypothesis, LinguisticIds, ScoreMode, SearchInput,
            SearchResult,
        },
    };

    // Re-export useful external types
    pub use anyhow;
    pub use tracing;
}
