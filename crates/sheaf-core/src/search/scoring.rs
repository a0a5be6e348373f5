//! Hypothesis scoring and ranking.
//!
//! Two scoring modes rank hypotheses during search:
//! - **Plain**: average log probability per token.
//! - **Smart**: a linguistic heuristic that upweights tokens near sentence
//!   starts (often content-bearing), penalizes pronoun overuse, and
//!   subtracts repetition and coverage penalties. A pure average biases
//!   toward generic short outputs; the heuristic produces better rankings
//!   without retraining the underlying model.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::decoder::TokenId;
use crate::error::{Result, SheafError};
use crate::search::hypothesis::{Hypothesis, DISQUALIFIED_SCORE};

/// Contiguous n-gram length whose repetition disqualifies a hypothesis.
pub const DISALLOWED_NGRAM: usize = 3;

/// Fixed penalty subtracted from the log probability of pronoun tokens.
pub const PRONOUN_PENALTY: f64 = 0.8;

/// Which scoring function ranks hypotheses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// Plain average log probability per token.
    #[default]
    Plain,
    /// Sentence-start weighting, pronoun penalty, repetition and coverage
    /// penalties.
    Smart,
}

/// Token id sets supplied by the vocabulary for the smart heuristic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinguisticIds {
    /// Tokens that mark the start of a sentence: the start token itself
    /// and sentence-ending punctuation.
    pub start_sent: HashSet<TokenId>,
    /// Stopword tokens excluded from sentence-start weighting.
    pub stopwords: HashSet<TokenId>,
    /// Pronoun tokens penalized to discourage anaphora without referents.
    pub pronouns: HashSet<TokenId>,
}

/// Scores and ranks hypotheses under a configured mode.
#[derive(Debug, Clone)]
pub struct Scorer {
    /// Distinguished end-of-sequence token.
    pub stop_token: TokenId,
    /// Reserved-vocabulary boundary: ids below it are unknown/placeholder.
    pub n_reserved: TokenId,
    /// Active scoring function.
    pub mode: ScoreMode,
    /// Linguistic id sets for the smart heuristic.
    pub ids: LinguisticIds,
}

impl Scorer {
    /// Weighted-average log probability under the smart heuristic.
    ///
    /// For every sentence-start token at position `i`, the following
    /// non-stopword positions `j` in the window `i+1..i+5` receive weight
    /// `1/(j-i+5)`; overlapping windows overwrite, so the most recent
    /// sentence start wins a position. Pronoun positions have
    /// [`PRONOUN_PENALTY`] subtracted from their working log probability.
    /// The result blends the working mean (0.75) with the
    /// sentence-start-weighted average (0.25).
    ///
    /// Fails with [`SheafError::DegenerateScoring`] when no position
    /// receives any weight and the weight vector cannot be normalized.
    pub fn smart_avg_log_prob<S>(&self, hyp: &Hypothesis<S>) -> Result<f64> {
        let tokens = hyp.tokens();
        let n = tokens.len();
        let mut weights = vec![0.0f64; n];
        let mut log_probs: Vec<f64> = hyp.log_probs().iter().map(|&lp| f64::from(lp)).collect();

        for (i, &token) in tokens.iter().enumerate() {
            if self.ids.start_sent.contains(&token) {
                for j in (i + 1)..n.min(i + 5) {
                    if !self.ids.stopwords.contains(&tokens[j]) {
                        weights[j] = 1.0 / (j - i + 5) as f64;
                    }
                }
            }
            if self.ids.pronouns.contains(&token) {
                log_probs[i] -= PRONOUN_PENALTY;
            }
        }

        let weight_sum: f64 = weights.iter().sum();
        if weight_sum <= 0.0 {
            return Err(SheafError::DegenerateScoring(
                "no sentence-start weight to normalize".into(),
            ));
        }

        let sentence_start: f64 = weights
            .iter()
            .zip(&log_probs)
            .map(|(w, lp)| w / weight_sum * lp)
            .sum();
        let mean: f64 = log_probs.iter().sum::<f64>() / n as f64;

        Ok(0.75 * mean + 0.25 * sentence_start)
    }

    /// Full smart score: the disqualification sentinel for sequences with
    /// unknown tokens, otherwise the smart average minus the repetition
    /// and coverage penalties.
    ///
    /// A hypothesis without decoding steps contributes no coverage loss.
    pub fn score<S>(&self, hyp: &Hypothesis<S>) -> Result<f64> {
        if hyp.has_unknown_token(self.n_reserved, self.stop_token) {
            return Ok(DISQUALIFIED_SCORE);
        }
        let smart = self.smart_avg_log_prob(hyp)?;
        let cov_loss = if hyp.attn_dists().is_empty() {
            0.0
        } else {
            hyp.cov_loss()?
        };
        Ok(smart - hyp.repeated_n_gram_loss(DISALLOWED_NGRAM) - cov_loss)
    }

    /// Score a hypothesis under the active mode.
    pub fn ranking_score<S>(&self, hyp: &Hypothesis<S>) -> Result<f64> {
        match self.mode {
            ScoreMode::Plain => Ok(hyp.avg_log_prob(self.n_reserved, self.stop_token)),
            ScoreMode::Smart => self.score(hyp),
        }
    }

    /// Sort hypotheses by descending score under the active mode.
    ///
    /// The sort is stable: hypotheses with equal scores keep their
    /// relative input order, which the driver relies on for reproducible
    /// selection.
    pub fn sort_hyps<S>(&self, hyps: Vec<Hypothesis<S>>) -> Result<Vec<Hypothesis<S>>> {
        let mut scored = Vec::with_capacity(hyps.len());
        for hyp in hyps {
            let score = self.ranking_score(&hyp)?;
            scored.push((score, hyp));
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        Ok(scored.into_iter().map(|(_, hyp)| hyp).collect())
    }
}
