//! The beam search driver.
//!
//! Maintains a bounded set of live hypotheses, queries the decode-step
//! capability once per step, expands every candidate continuation, ranks
//! all children globally, and partitions them into next-step live
//! hypotheses and completed results until the step cap or the result cap
//! is reached.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decoder::{DecodeStep, TokenId};
use crate::error::{Result, SheafError};
use crate::search::hypothesis::Hypothesis;
use crate::search::scoring::{LinguisticIds, ScoreMode, Scorer};

/// Completed-results cap, as a multiple of the beam size.
const RESULT_CAP_FACTOR: usize = 4;

/// Candidate fan-out per hypothesis, as a multiple of the beam size.
const CANDIDATE_FACTOR: usize = 2;

/// Configuration for one beam search decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamSearchConfig {
    /// Number of live hypotheses carried between steps.
    pub beam_size: usize,
    /// Hard cap on decoding steps.
    pub max_dec_steps: usize,
    /// No hypothesis may complete before this many steps.
    pub min_dec_steps: usize,
    /// Distinguished start-of-sequence token.
    pub start_token: TokenId,
    /// Distinguished end-of-sequence token.
    pub stop_token: TokenId,
    /// Reserved-vocabulary boundary: ids below it are unknown/placeholder
    /// tokens the model cannot meaningfully interpret.
    pub n_reserved: TokenId,
    /// Whether the model produces generation probabilities (copy
    /// mechanism).
    pub pointer_gen: bool,
    /// Active scoring function.
    pub mode: ScoreMode,
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            beam_size: 4,
            max_dec_steps: 100,
            min_dec_steps: 35,
            start_token: 2,
            stop_token: 3,
            n_reserved: 4,
            pointer_gen: false,
            mode: ScoreMode::Plain,
        }
    }
}

impl BeamSearchConfig {
    /// Check the configuration for illegal combinations.
    pub fn validate(&self) -> Result<()> {
        if self.beam_size == 0 {
            return Err(SheafError::InvalidConfig("beam_size must be positive".into()));
        }
        if self.max_dec_steps == 0 {
            return Err(SheafError::InvalidConfig(
                "max_dec_steps must be positive".into(),
            ));
        }
        if self.min_dec_steps > self.max_dec_steps {
            return Err(SheafError::InvalidConfig(format!(
                "min_dec_steps {} exceeds max_dec_steps {}",
                self.min_dec_steps, self.max_dec_steps
            )));
        }
        Ok(())
    }

    /// Completed results collected before the search stops.
    pub fn result_cap(&self) -> usize {
        RESULT_CAP_FACTOR * self.beam_size
    }

    /// Candidate continuations expected per hypothesis per step.
    pub fn candidates_per_hyp(&self) -> usize {
        CANDIDATE_FACTOR * self.beam_size
    }
}

/// Per-input context for one decode.
#[derive(Debug, Clone)]
pub struct SearchInput<S> {
    /// Initial decoder state produced by the encoder.
    pub init_state: S,
    /// Number of input positions attended over (the width of attention
    /// and coverage vectors).
    pub attn_len: usize,
    /// Remap from input-specific temporary OOV ids to the canonical
    /// unknown-token id, applied to latest tokens before each decode-step
    /// call. Hypotheses keep the original ids.
    pub oov_to_unk: HashMap<TokenId, TokenId>,
}

impl<S> SearchInput<S> {
    /// Input with no OOV remapping.
    pub fn new(init_state: S, attn_len: usize) -> Self {
        Self {
            init_state,
            attn_len,
            oov_to_unk: HashMap::new(),
        }
    }

    /// Attach an OOV remap table.
    pub fn with_oov_map(mut self, oov_to_unk: HashMap<TokenId, TokenId>) -> Self {
        self.oov_to_unk = oov_to_unk;
        self
    }
}

/// Winning hypothesis and its score under the active scoring function.
#[derive(Debug, Clone)]
pub struct SearchResult<S> {
    /// The best hypothesis found.
    pub best: Hypothesis<S>,
    /// Its final ranking score.
    pub score: f64,
}

/// Beam search decoder driving an abstract decode-step capability.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    config: BeamSearchConfig,
    scorer: Scorer,
}

impl BeamSearch {
    /// Create a driver from a validated configuration and the
    /// vocabulary's linguistic id sets.
    pub fn new(config: BeamSearchConfig, ids: LinguisticIds) -> Result<Self> {
        config.validate()?;
        let scorer = Scorer {
            stop_token: config.stop_token,
            n_reserved: config.n_reserved,
            mode: config.mode,
            ids,
        };
        Ok(Self { config, scorer })
    }

    /// The active configuration.
    pub fn config(&self) -> &BeamSearchConfig {
        &self.config
    }

    /// The configured scorer.
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Decode one input to completion and return the winning hypothesis.
    pub fn run<D: DecodeStep>(
        &self,
        model: &mut D,
        input: &SearchInput<D::State>,
    ) -> Result<SearchResult<D::State>> {
        let cfg = &self.config;
        let mut hyps: Vec<Hypothesis<D::State>> = (0..cfg.beam_size)
            .map(|_| {
                Hypothesis::root(
                    cfg.start_token,
                    input.init_state.clone(),
                    input.attn_len,
                    cfg.pointer_gen,
                )
            })
            .collect();
        let mut results: Vec<Hypothesis<D::State>> = Vec::new();
        let mut steps = 0;

        while steps < cfg.max_dec_steps && results.len() < cfg.result_cap() {
            // The model only knows the fixed vocabulary; map temporary
            // in-input OOV ids back to the canonical unknown id.
            let latest_tokens: Vec<TokenId> = hyps
                .iter()
                .map(|h| {
                    let t = h.latest_token();
                    input.oov_to_unk.get(&t).copied().unwrap_or(t)
                })
                .collect();
            let states: Vec<D::State> = hyps.iter().map(|h| h.state().clone()).collect();
            let prev_coverage: Vec<&[f32]> = hyps.iter().map(|h| h.coverage()).collect();

            let output = model.decode_step(&latest_tokens, &states, &prev_coverage)?;
            if output.expansions.len() != hyps.len() {
                return Err(SheafError::Model(format!(
                    "decode step returned {} expansions for {} hypotheses",
                    output.expansions.len(),
                    hyps.len()
                )));
            }

            // All beam slots are identical at step 0; expanding more than
            // the first would fill the beam with duplicates.
            let num_orig = if steps == 0 { 1 } else { hyps.len() };

            let mut all_hyps = Vec::with_capacity(num_orig * cfg.candidates_per_hyp());
            for (hyp, expansion) in hyps.iter().zip(output.expansions).take(num_orig) {
                let want = cfg.candidates_per_hyp();
                if expansion.topk_ids.len() != want || expansion.topk_log_probs.len() != want {
                    return Err(SheafError::Model(format!(
                        "decode step returned {} candidate ids and {} log probs, expected {}",
                        expansion.topk_ids.len(),
                        expansion.topk_log_probs.len(),
                        want
                    )));
                }
                let attn_dist: Arc<[f32]> = expansion.attn_dist.into();
                for (j, &token) in expansion.topk_ids.iter().enumerate() {
                    all_hyps.push(hyp.extend(
                        token,
                        expansion.topk_log_probs[j],
                        expansion.state.clone(),
                        attn_dist.clone(),
                        expansion.p_gen,
                        expansion.coverage.clone(),
                    )?);
                }
            }

            // Partition the globally ranked children: completions move to
            // results once long enough, unknown continuations are dropped,
            // the rest refill the beam.
            hyps = Vec::with_capacity(cfg.beam_size);
            for hyp in self.scorer.sort_hyps(all_hyps)? {
                let latest = hyp.latest_token();
                if latest == cfg.stop_token {
                    // Too-short completions are discarded, not recycled.
                    if steps >= cfg.min_dec_steps {
                        results.push(hyp);
                    }
                } else if latest >= cfg.n_reserved {
                    hyps.push(hyp);
                }
                if hyps.len() == cfg.beam_size || results.len() == cfg.result_cap() {
                    break;
                }
            }

            steps += 1;
            debug!(
                step = steps,
                live = hyps.len(),
                finished = results.len(),
                "beam step"
            );

            if hyps.is_empty() {
                // Every ranked child was discarded; nothing left to extend.
                break;
            }
        }

        if results.is_empty() {
            debug!(steps, "no completed hypotheses, ranking the live beam");
            results = hyps;
        }

        let mut ranked = self.scorer.sort_hyps(results)?;
        if ranked.is_empty() {
            return Err(SheafError::Search("no hypotheses to rank".into()));
        }
        let best = ranked.remove(0);
        let score = self.scorer.ranking_score(&best)?;
        Ok(SearchResult { best, score })
    }
}
