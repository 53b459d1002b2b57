//! Information-gain pair selection.
//!
//! Every unordered pair `(i, j)`, `i < j`, is scored as
//!
//! ```text
//! score = σ_diff · H(Φ(Δμ / (ε + σ_diff))) + w / (1 + times compared)
//! ```
//!
//! where `H` is binary entropy in bits. The entropy term peaks for pairs the
//! belief considers a coin flip, scaled by how uncertain the difference is;
//! the exploration term keeps rarely-compared pairs in play.

use std::cmp::Ordering;

use serde::Serialize;

use crate::belief::BeliefState;
use crate::choice_model::{binary_entropy, win_probability};
use crate::config::SelectorConfig;
use crate::error::ConfigurationError;

/// Floor applied to the difference spread when two items are (numerically)
/// perfectly correlated.
pub const SIGMA_DIFF_FLOOR: f64 = 1e-9;

/// Score breakdown for one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairScore {
    pub i: usize,
    pub j: usize,
    /// Probability `i` is chosen under the current belief.
    pub p_first: f64,
    pub sigma_diff: f64,
    pub gain: f64,
    pub exploration_bonus: f64,
    pub score: f64,
    /// The spread was floored at [`SIGMA_DIFF_FLOOR`].
    pub degenerate: bool,
}

/// Result of one selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub best: PairScore,
    /// Pairs whose spread collapsed and had to be floored during this pass.
    pub degenerate_pairs: Vec<(usize, usize)>,
}

impl Selection {
    pub fn pair(&self) -> (usize, usize) {
        (self.best.i, self.best.j)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairSelector {
    config: SelectorConfig,
}

impl PairSelector {
    pub fn new(config: SelectorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Score a single pair. `i` and `j` must be distinct, in-range indices.
    pub fn score_pair(&self, state: &BeliefState, i: usize, j: usize) -> PairScore {
        let mu = state.mu();
        let mu_diff = mu[i] - mu[j];

        // A negative difference variance only arises from round-off on a
        // near-singular covariance; `max` also maps NaN to 0.
        let raw = state.diff_variance(i, j).max(0.0).sqrt();
        let degenerate = raw < SIGMA_DIFF_FLOOR;
        let sigma_diff = if degenerate { SIGMA_DIFF_FLOOR } else { raw };

        let p_first = win_probability(mu_diff, self.config.epsilon + sigma_diff);
        let gain = sigma_diff * binary_entropy(p_first);
        let exploration_bonus =
            self.config.exploration_weight / (1.0 + state.times_compared(i, j) as f64);

        PairScore {
            i,
            j,
            p_first,
            sigma_diff,
            gain,
            exploration_bonus,
            score: gain + exploration_bonus,
            degenerate,
        }
    }

    /// Pick the highest-scoring pair. Exact ties go to the first pair in
    /// ascending `(i, j)` order.
    pub fn select(&self, state: &BeliefState) -> Selection {
        let n = state.n_items();
        let mut best: Option<PairScore> = None;
        let mut degenerate_pairs = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let candidate = self.score_pair(state, i, j);
                if candidate.degenerate {
                    degenerate_pairs.push((i, j));
                }
                let better = match &best {
                    None => true,
                    Some(b) => candidate.score > b.score,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        // n >= 2 is enforced when the belief is built, so (0, 1) always exists.
        let best = best.unwrap_or_else(|| self.score_pair(state, 0, 1));

        if !degenerate_pairs.is_empty() {
            tracing::warn!(
                count = degenerate_pairs.len(),
                "difference spread collapsed for some pairs; covariance may be near-singular"
            );
        }
        tracing::debug!(i = best.i, j = best.j, score = best.score, "selected pair");

        Selection {
            best,
            degenerate_pairs,
        }
    }

    /// Every candidate pair, best first, ties in ascending `(i, j)` order.
    pub fn score_pairs(&self, state: &BeliefState) -> Vec<PairScore> {
        let n = state.n_items();
        let mut scores = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                scores.push(self.score_pair(state, i, j));
            }
        }
        scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.i.cmp(&b.i))
                .then_with(|| a.j.cmp(&b.j))
        });
        scores
    }
}

/// Select the next pair to present for `state`.
pub fn select_next_pair(
    state: &BeliefState,
    epsilon: f64,
    exploration_weight: f64,
) -> Result<(usize, usize), ConfigurationError> {
    let selector = PairSelector::new(SelectorConfig::new(epsilon, exploration_weight)?)?;
    Ok(selector.select(state).pair())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefSnapshot;

    fn selector(epsilon: f64, w: f64) -> PairSelector {
        PairSelector::new(SelectorConfig::new(epsilon, w).unwrap()).unwrap()
    }

    fn state_from(mu: Vec<f64>, sigma: Vec<f64>, comparisons: Vec<u64>) -> BeliefState {
        let n_items = mu.len();
        BeliefState::from_snapshot(&BeliefSnapshot {
            n_items,
            mu,
            sigma,
            comparisons,
        })
        .unwrap()
    }

    #[test]
    fn uniform_prior_picks_first_pair() {
        let state = BeliefState::new(5, 0.0, 1.0).unwrap();
        assert_eq!(selector(0.1, 0.1).select(&state).pair(), (0, 1));
    }

    #[test]
    fn prefers_close_uncertain_pairs() {
        // Items 1 and 2 are a coin flip; 0 is far ahead of both.
        let state = state_from(
            vec![3.0, 0.0, 0.05],
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            vec![0; 9],
        );
        assert_eq!(selector(0.01, 0.0).select(&state).pair(), (1, 2));
    }

    #[test]
    fn exploration_bonus_decays_with_comparisons() {
        let mut comparisons = vec![0; 9];
        comparisons[1] = 3; // (0, 1)
        let state = state_from(
            vec![0.0; 3],
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            comparisons,
        );
        let s = selector(0.1, 1.0);
        let seen = s.score_pair(&state, 0, 1);
        let fresh = s.score_pair(&state, 0, 2);
        assert!((seen.exploration_bonus - 0.25).abs() < 1e-15);
        assert!((fresh.exploration_bonus - 1.0).abs() < 1e-15);
        assert_eq!(s.select(&state).pair(), (0, 2));
    }

    #[test]
    fn correlated_pair_is_floored_not_nan() {
        let state = state_from(
            vec![0.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            vec![0; 9],
        );
        let s = selector(0.1, 0.1);
        let score = s.score_pair(&state, 0, 1);
        assert!(score.degenerate);
        assert_eq!(score.sigma_diff, SIGMA_DIFF_FLOOR);
        assert!(score.score.is_finite());

        let selection = s.select(&state);
        assert_eq!(selection.degenerate_pairs, vec![(0, 1)]);
        assert_ne!(selection.pair(), (0, 1));
    }

    #[test]
    fn score_pairs_is_sorted_and_agrees_with_select() {
        let state = state_from(
            vec![0.4, -0.2, 0.1, 0.0],
            vec![
                1.0, 0.1, 0.0, 0.0, //
                0.1, 0.8, 0.0, 0.0, //
                0.0, 0.0, 0.5, 0.2, //
                0.0, 0.0, 0.2, 0.9,
            ],
            vec![0; 16],
        );
        let s = selector(0.05, 0.1);
        let all = s.score_pairs(&state);
        assert_eq!(all.len(), 6);
        for w in all.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
        assert_eq!((all[0].i, all[0].j), s.select(&state).pair());
    }

    #[test]
    fn free_function_validates_config() {
        let state = BeliefState::new(3, 0.0, 1.0).unwrap();
        assert_eq!(
            select_next_pair(&state, 0.0, 0.1),
            Err(ConfigurationError::NonPositiveEpsilon(0.0))
        );
        assert_eq!(
            select_next_pair(&state, 0.1, -0.1),
            Err(ConfigurationError::NegativeExplorationWeight(-0.1))
        );
        assert_eq!(select_next_pair(&state, 0.1, 0.1), Ok((0, 1)));
    }
}
