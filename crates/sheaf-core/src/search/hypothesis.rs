//! Candidate sequences tracked during beam search.

use std::collections::HashSet;
use std::sync::Arc;

use crate::decoder::TokenId;
use crate::error::{Result, SheafError};

/// Score assigned to hypotheses containing unknown-vocabulary tokens.
///
/// Disqualified hypotheses stay comparable and sortable; they simply lose
/// against every valid hypothesis.
pub const DISQUALIFIED_SCORE: f64 = -1e6;

/// Penalty returned when any disallowed n-gram repeats within a sequence.
pub const REPEATED_NGRAM_PENALTY: f64 = 1e6;

/// One candidate output sequence at a point in the search.
///
/// A hypothesis is an immutable value: [`extend`](Hypothesis::extend)
/// returns a new child and never touches the parent, so branches of the
/// search can coexist without aliasing. Attention distributions are shared
/// between parent and child behind `Arc`; `state` and `coverage` are
/// replaced outright on each extension.
///
/// Invariant: `tokens.len() == log_probs.len() == attn_dists.len() + 1`,
/// and `p_gens` (when present) parallels `attn_dists`.
#[derive(Debug, Clone)]
pub struct Hypothesis<S> {
    tokens: Vec<TokenId>,
    log_probs: Vec<f32>,
    state: S,
    attn_dists: Vec<Arc<[f32]>>,
    p_gens: Option<Vec<f32>>,
    coverage: Vec<f32>,
}

impl<S> Hypothesis<S> {
    /// Create the root hypothesis for one beam slot: a single start token
    /// with log probability zero, no attention history and zero coverage.
    pub fn root(start_token: TokenId, state: S, attn_len: usize, pointer_gen: bool) -> Self {
        Self {
            tokens: vec![start_token],
            log_probs: vec![0.0],
            state,
            attn_dists: Vec::new(),
            p_gens: pointer_gen.then(Vec::new),
            coverage: vec![0.0; attn_len],
        }
    }

    /// Build a hypothesis from complete histories, validating the length
    /// invariants.
    pub fn from_parts(
        tokens: Vec<TokenId>,
        log_probs: Vec<f32>,
        state: S,
        attn_dists: Vec<Arc<[f32]>>,
        p_gens: Option<Vec<f32>>,
        coverage: Vec<f32>,
    ) -> Result<Self> {
        if tokens.is_empty() {
            return Err(SheafError::MalformedHypothesis(
                "empty token sequence".into(),
            ));
        }
        if tokens.len() != log_probs.len() {
            return Err(SheafError::MalformedHypothesis(format!(
                "{} tokens but {} log probs",
                tokens.len(),
                log_probs.len()
            )));
        }
        if attn_dists.len() + 1 != tokens.len() {
            return Err(SheafError::MalformedHypothesis(format!(
                "{} tokens require {} attention distributions, got {}",
                tokens.len(),
                tokens.len() - 1,
                attn_dists.len()
            )));
        }
        if let Some(p_gens) = &p_gens {
            if p_gens.len() != attn_dists.len() {
                return Err(SheafError::MalformedHypothesis(format!(
                    "{} attention distributions but {} generation probabilities",
                    attn_dists.len(),
                    p_gens.len()
                )));
            }
        }
        if attn_dists.iter().any(|a| a.len() != coverage.len()) {
            return Err(SheafError::MalformedHypothesis(
                "attention length differs from coverage length".into(),
            ));
        }

        Ok(Self {
            tokens,
            log_probs,
            state,
            attn_dists,
            p_gens,
            coverage,
        })
    }

    /// Return a new hypothesis extended with the latest step of search.
    ///
    /// The parent's histories are copied and appended to; `state` and
    /// `coverage` replace the parent's outright. The parent is unchanged.
    pub fn extend(
        &self,
        token: TokenId,
        log_prob: f32,
        state: S,
        attn_dist: Arc<[f32]>,
        p_gen: Option<f32>,
        coverage: Vec<f32>,
    ) -> Result<Self> {
        if attn_dist.len() != self.coverage.len() {
            return Err(SheafError::MalformedHypothesis(format!(
                "attention distribution of length {} over {} input positions",
                attn_dist.len(),
                self.coverage.len()
            )));
        }
        if coverage.len() != self.coverage.len() {
            return Err(SheafError::MalformedHypothesis(format!(
                "coverage length changed from {} to {}",
                self.coverage.len(),
                coverage.len()
            )));
        }
        let p_gens = match (&self.p_gens, p_gen) {
            (Some(prev), Some(p)) => {
                let mut p_gens = prev.clone();
                p_gens.push(p);
                Some(p_gens)
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(SheafError::MalformedHypothesis(
                    "missing generation probability for a pointer-generator hypothesis".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(SheafError::MalformedHypothesis(
                    "unexpected generation probability for a non-pointer hypothesis".into(),
                ))
            }
        };

        let mut tokens = self.tokens.clone();
        tokens.push(token);
        let mut log_probs = self.log_probs.clone();
        log_probs.push(log_prob);
        let mut attn_dists = self.attn_dists.clone();
        attn_dists.push(attn_dist);

        Ok(Self {
            tokens,
            log_probs,
            state,
            attn_dists,
            p_gens,
            coverage,
        })
    }

    /// Token ids of the sequence so far, starting with the start token.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Log probability of each token, aligned with `tokens`.
    pub fn log_probs(&self) -> &[f32] {
        &self.log_probs
    }

    /// Current decoder state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Attention distributions so far, one per decoding step.
    pub fn attn_dists(&self) -> &[Arc<[f32]>] {
        &self.attn_dists
    }

    /// Generation probabilities so far, absent without a copy mechanism.
    pub fn p_gens(&self) -> Option<&[f32]> {
        self.p_gens.as_deref()
    }

    /// Current coverage vector.
    pub fn coverage(&self) -> &[f32] {
        &self.coverage
    }

    /// The most recently produced token.
    pub fn latest_token(&self) -> TokenId {
        self.tokens[self.tokens.len() - 1]
    }

    /// Number of decoding steps taken (tokens beyond the start token).
    pub fn num_steps(&self) -> usize {
        self.attn_dists.len()
    }

    /// True if the sequence is disqualified by a reserved token: any
    /// interior token below `n_reserved`, or a final token below
    /// `n_reserved` that is not the stop token.
    pub fn has_unknown_token(&self, n_reserved: TokenId, stop_token: TokenId) -> bool {
        let interior_len = self.tokens.len().saturating_sub(2);
        if self
            .tokens
            .iter()
            .skip(1)
            .take(interior_len)
            .any(|&t| t < n_reserved)
        {
            return true;
        }
        let latest = self.latest_token();
        latest < n_reserved && latest != stop_token
    }

    /// Average log probability per token, or the disqualification
    /// sentinel.
    ///
    /// The denominator is the token count including the start token, not
    /// the step count.
    pub fn avg_log_prob(&self, n_reserved: TokenId, stop_token: TokenId) -> f64 {
        if self.has_unknown_token(n_reserved, stop_token) {
            return DISQUALIFIED_SCORE;
        }
        let sum: f64 = self.log_probs.iter().map(|&lp| f64::from(lp)).sum();
        sum / self.tokens.len() as f64
    }

    /// Penalty for any repeated contiguous `n`-gram in the token
    /// sequence: [`REPEATED_NGRAM_PENALTY`] on the first repeat found,
    /// otherwise 0. `n` must be nonzero.
    pub fn repeated_n_gram_loss(&self, n: usize) -> f64 {
        let mut seen = HashSet::new();
        for gram in self.tokens.windows(n) {
            if !seen.insert(gram) {
                return REPEATED_NGRAM_PENALTY;
            }
        }
        0.0
    }

    /// Coverage loss: replay the attention history from zero coverage,
    /// summing at each step the element-wise minimum of that step's
    /// attention and the coverage accumulated so far, then folding the
    /// attention into the coverage. Returns the mean per-step loss.
    pub fn cov_loss(&self) -> Result<f64> {
        if self.attn_dists.is_empty() {
            return Err(SheafError::MalformedHypothesis(
                "coverage loss requested before any decoding step".into(),
            ));
        }

        let mut coverage = vec![0.0f32; self.coverage.len()];
        let mut total = 0.0f64;
        for attn in &self.attn_dists {
            let step_loss: f32 = attn.iter().zip(&coverage).map(|(a, c)| a.min(*c)).sum();
            total += f64::from(step_loss);
            for (c, a) in coverage.iter_mut().zip(attn.iter()) {
                *c += a;
            }
        }

        Ok(total / self.attn_dists.len() as f64)
    }

    /// Mean of the per-step maximum attention weight. Diagnostic only;
    /// not part of any scoring mode.
    pub fn avg_top_attn(&self) -> Result<f64> {
        if self.attn_dists.is_empty() {
            return Err(SheafError::MalformedHypothesis(
                "attention summary requested before any decoding step".into(),
            ));
        }

        let sum: f64 = self
            .attn_dists
            .iter()
            .map(|attn| f64::from(attn.iter().copied().fold(f32::NEG_INFINITY, f32::max)))
            .sum();
        Ok(sum / self.attn_dists.len() as f64)
    }
}
