//! The abstract decode-step capability.
//!
//! The search core never talks to a concrete network. A model backend
//! implements [`DecodeStep`]: given the latest token, decoder state and
//! coverage vector of every live hypothesis, it returns the top candidate
//! next tokens per hypothesis together with the updated state, attention
//! distribution, generation probability and coverage vector. Any backend
//! satisfies the seam by structural conformance; the decoder state is an
//! opaque associated type the core only clones and hands back.

use crate::error::{Result, SheafError};

/// Integer token identifier.
pub type TokenId = u32;

/// Output of one decode step, one entry per live hypothesis.
#[derive(Debug, Clone)]
pub struct StepOutput<S> {
    /// Per-hypothesis expansions, in the order the hypotheses were passed.
    pub expansions: Vec<StepExpansion<S>>,
}

/// Candidate continuations for a single hypothesis.
#[derive(Debug, Clone)]
pub struct StepExpansion<S> {
    /// Top candidate next tokens, most probable first. The driver expects
    /// exactly `2 * beam_size` entries.
    pub topk_ids: Vec<TokenId>,
    /// Log probability of each candidate, aligned with `topk_ids`.
    pub topk_log_probs: Vec<f32>,
    /// Updated decoder state after consuming the latest token.
    pub state: S,
    /// Attention distribution over input positions for this step.
    pub attn_dist: Vec<f32>,
    /// Generation probability, absent for models without a copy mechanism.
    pub p_gen: Option<f32>,
    /// Updated coverage vector.
    pub coverage: Vec<f32>,
}

/// One step of decoding for a set of live hypotheses.
///
/// Implementations must be deterministic given identical inputs. The beam
/// driver treats the call as atomic and blocking, and performs no retries:
/// a single failure aborts the decode of the current input.
pub trait DecodeStep {
    /// Opaque decoder state carried by each hypothesis. Handles should be
    /// cheap to clone (reference-counted in real model integrations).
    type State: Clone;

    /// Produce candidate continuations for every live hypothesis.
    ///
    /// `latest_tokens`, `states` and `prev_coverage` are aligned by
    /// hypothesis; the returned expansions must be too.
    fn decode_step(
        &mut self,
        latest_tokens: &[TokenId],
        states: &[Self::State],
        prev_coverage: &[&[f32]],
    ) -> Result<StepOutput<Self::State>>;
}

/// A deterministic decoder that replays a fixed script.
///
/// Useful for tests or when candidate continuations are predetermined:
/// each script entry is one candidate list offered to every live
/// hypothesis that step, with a uniform attention distribution and
/// additive coverage. Once the script is exhausted the final entry
/// repeats. The decoder state is the decode depth.
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    steps: Vec<Vec<(TokenId, f32)>>,
    attn_len: usize,
    p_gen: Option<f32>,
    cursor: usize,
}

impl ScriptedDecoder {
    /// Create a scripted decoder over `attn_len` input positions.
    pub fn new(steps: Vec<Vec<(TokenId, f32)>>, attn_len: usize) -> Self {
        Self {
            steps,
            attn_len,
            p_gen: None,
            cursor: 0,
        }
    }

    /// Emit a fixed generation probability each step (copy-mechanism mode).
    pub fn with_p_gen(mut self, p_gen: f32) -> Self {
        self.p_gen = Some(p_gen);
        self
    }

    /// Number of decode-step calls served so far.
    pub fn calls(&self) -> usize {
        self.cursor
    }
}

impl DecodeStep for ScriptedDecoder {
    type State = usize;

    fn decode_step(
        &mut self,
        latest_tokens: &[TokenId],
        states: &[usize],
        prev_coverage: &[&[f32]],
    ) -> Result<StepOutput<usize>> {
        if latest_tokens.len() != states.len() || latest_tokens.len() != prev_coverage.len() {
            return Err(SheafError::Model(format!(
                "mismatched decode-step inputs: {} tokens, {} states, {} coverages",
                latest_tokens.len(),
                states.len(),
                prev_coverage.len()
            )));
        }

        let step = self
            .steps
            .get(self.cursor)
            .or_else(|| self.steps.last())
            .ok_or_else(|| SheafError::Model("scripted decoder has an empty script".into()))?;
        self.cursor += 1;

        let attn_dist = vec![1.0 / self.attn_len as f32; self.attn_len];
        let expansions = states
            .iter()
            .zip(prev_coverage)
            .map(|(&state, prev)| {
                let coverage = prev
                    .iter()
                    .zip(&attn_dist)
                    .map(|(c, a)| c + a)
                    .collect();
                StepExpansion {
                    topk_ids: step.iter().map(|&(t, _)| t).collect(),
                    topk_log_probs: step.iter().map(|&(_, lp)| lp).collect(),
                    state: state + 1,
                    attn_dist: attn_dist.clone(),
                    p_gen: self.p_gen,
                    coverage,
                }
            })
            .collect();

        Ok(StepOutput { expansions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_decoder_replicates_per_hypothesis() {
        let mut decoder = ScriptedDecoder::new(vec![vec![(5, -0.5), (6, -1.0)]], 2);

        let cov = vec![0.0f32, 0.0];
        let out = decoder
            .decode_step(&[1, 1, 1], &[0, 0, 0], &[&cov, &cov, &cov])
            .unwrap();

        assert_eq!(out.expansions.len(), 3);
        for exp in &out.expansions {
            assert_eq!(exp.topk_ids, vec![5, 6]);
            assert_eq!(exp.topk_log_probs, vec![-0.5, -1.0]);
            assert_eq!(exp.state, 1);
            assert_eq!(exp.attn_dist, vec![0.5, 0.5]);
            assert_eq!(exp.coverage, vec![0.5, 0.5]);
            assert!(exp.p_gen.is_none());
        }
    }

    #[test]
    fn scripted_decoder_repeats_final_step() {
        let mut decoder =
            ScriptedDecoder::new(vec![vec![(1, -0.1), (2, -0.2)], vec![(3, -0.3), (4, -0.4)]], 1);

        let cov = vec![0.0f32];
        for _ in 0..3 {
            decoder.decode_step(&[1], &[0], &[&cov]).unwrap();
        }
        let out = decoder.decode_step(&[1], &[0], &[&cov]).unwrap();

        assert_eq!(out.expansions[0].topk_ids, vec![3, 4]);
        assert_eq!(decoder.calls(), 4);
    }

    #[test]
    fn scripted_decoder_accumulates_coverage() {
        let mut decoder = ScriptedDecoder::new(vec![vec![(1, -0.1), (2, -0.2)]], 4);

        let cov = vec![0.25f32, 0.0, 0.5, 0.0];
        let out = decoder.decode_step(&[1], &[3], &[&cov]).unwrap();

        assert_eq!(out.expansions[0].coverage, vec![0.5, 0.25, 0.75, 0.25]);
        assert_eq!(out.expansions[0].state, 4);
    }

    #[test]
    fn scripted_decoder_carries_p_gen() {
        let mut decoder = ScriptedDecoder::new(vec![vec![(1, -0.1), (2, -0.2)]], 1).with_p_gen(0.7);

        let cov = vec![0.0f32];
        let out = decoder.decode_step(&[1], &[0], &[&cov]).unwrap();

        assert_eq!(out.expansions[0].p_gen, Some(0.7));
    }

    #[test]
    fn scripted_decoder_rejects_misaligned_inputs() {
        let mut decoder = ScriptedDecoder::new(vec![vec![(1, -0.1), (2, -0.2)]], 1);

        let cov = vec![0.0f32];
        let err = decoder.decode_step(&[1, 2], &[0], &[&cov]).unwrap_err();
        assert!(matches!(err, SheafError::Model(_)));
    }
}
