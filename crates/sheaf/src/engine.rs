//! High-level decode harness.
//!
//! Drives beam search over a stream of inputs with the per-input failure
//! policy: a failed decode is logged and skipped, and decoding continues
//! with the next input.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use sheaf_core::decoder::DecodeStep;
use sheaf_core::search::{BeamSearch, BeamSearchConfig, LinguisticIds, SearchInput, SearchResult};

/// Configuration for the decode harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Beam search configuration.
    pub search: BeamSearchConfig,
    /// Linguistic id sets from the vocabulary.
    pub ids: LinguisticIds,
}

impl DecoderConfig {
    /// Load from JSON file.
    pub fn from_file(path: &Path) -> sheaf_core::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

/// Builder for creating a Decoder.
pub struct DecoderBuilder {
    config: DecoderConfig,
}

impl DecoderBuilder {
    /// Create a new decoder builder.
    pub fn new() -> Self {
        Self {
            config: DecoderConfig::default(),
        }
    }

    /// Set the beam search configuration.
    pub fn search(mut self, search: BeamSearchConfig) -> Self {
        self.config.search = search;
        self
    }

    /// Set the linguistic id sets.
    pub fn ids(mut self, ids: LinguisticIds) -> Self {
        self.config.ids = ids;
        self
    }

    /// Set the full configuration directly.
    pub fn config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the decoder.
    pub fn build(self) -> Result<Decoder> {
        let search = BeamSearch::new(self.config.search, self.config.ids)?;
        Ok(Decoder { search })
    }
}

impl Default for DecoderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A stream of decode inputs, typically one per source article.
pub trait InputSource<S> {
    /// Produce the next input, or `None` when the stream is exhausted.
    fn next_input(&mut self) -> Result<Option<SearchInput<S>>>;
}

/// Outcome of a [`Decoder::decode_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeSummary {
    /// Inputs decoded to completion.
    pub decoded: usize,
    /// Inputs skipped after a decode failure.
    pub skipped: usize,
    /// Mean winning score across decoded inputs (0.0 when none).
    pub mean_score: f64,
}

/// Beam search decode harness.
pub struct Decoder {
    search: BeamSearch,
}

impl Decoder {
    /// Start building a decoder.
    pub fn builder() -> DecoderBuilder {
        DecoderBuilder::new()
    }

    /// The underlying beam search driver.
    pub fn search(&self) -> &BeamSearch {
        &self.search
    }

    /// Decode a single input to completion.
    pub fn decode_one<D: DecodeStep>(
        &self,
        model: &mut D,
        input: &SearchInput<D::State>,
    ) -> sheaf_core::Result<SearchResult<D::State>> {
        let started = Instant::now();
        let result = self.search.run(model, input)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            score = result.score,
            "decoded one input"
        );
        Ok(result)
    }

    /// Decode inputs until the source is exhausted.
    ///
    /// A failed input is logged and skipped. Winning hypotheses are
    /// handed to `sink` as they are produced; source failures end the
    /// run.
    pub fn decode_all<D, I, F>(
        &self,
        model: &mut D,
        source: &mut I,
        mut sink: F,
    ) -> Result<DecodeSummary>
    where
        D: DecodeStep,
        I: InputSource<D::State>,
        F: FnMut(SearchResult<D::State>),
    {
        let mut summary = DecodeSummary::default();
        let mut score_sum = 0.0;

        while let Some(input) = source.next_input()? {
            match self.decode_one(model, &input) {
                Ok(result) => {
                    summary.decoded += 1;
                    score_sum += result.score;
                    summary.mean_score = score_sum / summary.decoded as f64;
                    info!(
                        decoded = summary.decoded,
                        mean_score = summary.mean_score,
                        "running mean score"
                    );
                    sink(result);
                }
                Err(err) => {
                    summary.skipped += 1;
                    warn!(%err, "skipping input after decode failure");
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_core::decoder::{StepExpansion, StepOutput, TokenId};
    use sheaf_core::search::ScoreMode;
    use sheaf_core::SheafError;

    fn test_config() -> BeamSearchConfig {
        BeamSearchConfig {
            beam_size: 1,
            max_dec_steps: 10,
            min_dec_steps: 0,
            start_token: 2,
            stop_token: 3,
            n_reserved: 4,
            pointer_gen: false,
            mode: ScoreMode::Plain,
        }
    }

    /// Emits the stop token as the top candidate; fails whenever the
    /// carried state is negative (used to poison individual inputs).
    struct PoisonableDecoder;

    impl DecodeStep for PoisonableDecoder {
        type State = i32;

        fn decode_step(
            &mut self,
            latest_tokens: &[TokenId],
            states: &[i32],
            _prev_coverage: &[&[f32]],
        ) -> sheaf_core::Result<StepOutput<i32>> {
            if states.iter().any(|&s| s < 0) {
                return Err(SheafError::Model("poisoned state".into()));
            }
            let expansions = latest_tokens
                .iter()
                .map(|_| StepExpansion {
                    topk_ids: vec![3, 10],
                    topk_log_probs: vec![-0.1, -0.2],
                    state: 0,
                    attn_dist: vec![0.5, 0.5],
                    p_gen: None,
                    coverage: vec![0.5, 0.5],
                })
                .collect();
            Ok(StepOutput { expansions })
        }
    }

    struct VecSource {
        inputs: Vec<SearchInput<i32>>,
    }

    impl InputSource<i32> for VecSource {
        fn next_input(&mut self) -> Result<Option<SearchInput<i32>>> {
            Ok(if self.inputs.is_empty() {
                None
            } else {
                Some(self.inputs.remove(0))
            })
        }
    }

    #[test]
    fn builder_rejects_invalid_search_config() {
        let mut config = test_config();
        config.beam_size = 0;
        assert!(Decoder::builder().search(config).build().is_err());
    }

    #[test]
    fn decode_one_returns_the_winner() {
        let decoder = Decoder::builder().search(test_config()).build().unwrap();
        let mut model = PoisonableDecoder;

        let result = decoder.decode_one(&mut model, &SearchInput::new(0, 2)).unwrap();

        assert_eq!(result.best.tokens(), &[2, 3]);
        assert!((result.score - (-0.1f64 / 2.0)).abs() < 1e-6);
    }

    #[test]
    fn decode_all_skips_failed_inputs() {
        let decoder = Decoder::builder().search(test_config()).build().unwrap();
        let mut model = PoisonableDecoder;
        let mut source = VecSource {
            inputs: vec![
                SearchInput::new(0, 2),
                SearchInput::new(-1, 2),
                SearchInput::new(0, 2),
            ],
        };

        let mut winners = Vec::new();
        let summary = decoder
            .decode_all(&mut model, &mut source, |r| winners.push(r))
            .unwrap();

        assert_eq!(summary.decoded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(winners.len(), 2);
        assert!((summary.mean_score - (-0.1f64 / 2.0)).abs() < 1e-6);
    }

    #[test]
    fn decoder_config_round_trips_through_json() {
        let config = DecoderConfig {
            search: test_config(),
            ids: LinguisticIds {
                start_sent: [2, 9].into_iter().collect(),
                stopwords: [20].into_iter().collect(),
                pronouns: [21, 22].into_iter().collect(),
            },
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: DecoderConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.search.beam_size, config.search.beam_size);
        assert_eq!(parsed.search.mode, ScoreMode::Plain);
        assert_eq!(parsed.ids.start_sent, config.ids.start_sent);
        assert_eq!(parsed.ids.pronouns, config.ids.pronouns);
    }
}
