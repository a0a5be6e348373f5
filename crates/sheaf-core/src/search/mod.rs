//! Beam search over candidate hypotheses.
//!
//! The search system is built from three parts:
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Hypothesis`] | Immutable-append candidate sequence with state, attention and coverage history |
//! | [`Scorer`] | Plain or smart ranking of hypotheses |
//! | [`BeamSearch`] | Step loop driving an abstract decode-step capability |
//!
//! # Example
//!
//! ```
//! # fn main() -> sheaf_core::Result<()> {
//! use sheaf_core::decoder::ScriptedDecoder;
//! use sheaf_core::search::{BeamSearch, BeamSearchConfig, LinguisticIds, ScoreMode, SearchInput};
//!
//! let config = BeamSearchConfig {
//!     beam_size: 1,
//!     max_dec_steps: 8,
//!     min_dec_steps: 1,
//!     start_token: 2,
//!     stop_token: 3,
//!     n_reserved: 4,
//!     pointer_gen: false,
//!     mode: ScoreMode::Plain,
//! };
//! let search = BeamSearch::new(config, LinguisticIds::default())?;
//!
//! // Two candidates per step (2 * beam_size); the stop token becomes the
//! // top candidate from the second step on.
//! let mut model = ScriptedDecoder::new(
//!     vec![
//!         vec![(10, -0.1), (11, -0.2)],
//!         vec![(3, -0.1), (10, -0.2)],
//!     ],
//!     4,
//! );
//!
//! let result = search.run(&mut model, &SearchInput::new(0, 4))?;
//! assert_eq!(result.best.tokens(), &[2, 10, 3]);
//! # Ok(())
//! # }
//! ```

mod beam;
mod hypothesis;
mod scoring;

pub use beam::{BeamSearch, BeamSearchConfig, SearchInput, SearchResult};
pub use hypothesis::{Hypothesis, DISQUALIFIED_SCORE, REPEATED_NGRAM_PENALTY};
pub use scoring::{LinguisticIds, ScoreMode, Scorer, DISALLOWED_NGRAM, PRONOUN_PENALTY};
