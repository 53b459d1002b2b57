//! Laplace-approximated probit update of the Gaussian belief.
//!
//! After item `winner` is chosen from the presented pair `(i, j)`:
//!
//! 1. `comparisons[(i, j)] += 1` (presentation order, not winner).
//! 2. The means of `i` and `j` move along the gradient of the probit
//!    log-likelihood, scaled through the covariance.
//! 3. The covariance receives a rank-one downdate along
//!    `v = (e_i − e_j) / σ_diff` weighted by the observation's precision.
//!
//! The arithmetic is kept in the exact order below; convergence behavior
//! downstream depends on matching it.

use nalgebra::DVector;
use serde::Serialize;

use crate::belief::BeliefState;
use crate::choice_model::{normal_cdf, normal_pdf, NUMERIC_FLOOR};
use crate::error::{ConfigurationError, PreferenceError, ValidationError};
use crate::selector::SIGMA_DIFF_FLOOR;

/// What one update did, for logging and observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub i: usize,
    pub j: usize,
    pub winner: usize,
    /// `mu[i] - mu[j]` before the update.
    pub mu_diff: f64,
    pub z: f64,
    /// Probability of the observed choice under the prior belief.
    pub p_obs: f64,
    pub info_gain: f64,
    /// The covariance part of the difference variance had collapsed; only
    /// the ε² noise term kept the update finite.
    pub degenerate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeliefUpdater {
    epsilon: f64,
}

impl BeliefUpdater {
    pub fn new(epsilon: f64) -> Result<Self, ConfigurationError> {
        if !epsilon.is_finite() {
            return Err(ConfigurationError::NonFinite { field: "epsilon" });
        }
        if epsilon <= 0.0 {
            return Err(ConfigurationError::NonPositiveEpsilon(epsilon));
        }
        Ok(Self { epsilon })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Check a trial against `state` without touching it.
    pub fn validate_trial(
        state: &BeliefState,
        i: usize,
        j: usize,
        winner: usize,
    ) -> Result<(), ValidationError> {
        state.check_index(i)?;
        state.check_index(j)?;
        if i == j {
            return Err(ValidationError::SelfComparison { index: i });
        }
        if winner != i && winner != j {
            return Err(ValidationError::WinnerNotInPair { winner, i, j });
        }
        Ok(())
    }

    /// Apply one observed choice to `state` in place. On error the state is
    /// left untouched.
    pub fn update(
        &self,
        state: &mut BeliefState,
        i: usize,
        j: usize,
        winner: usize,
    ) -> Result<UpdateOutcome, ValidationError> {
        Self::validate_trial(state, i, j, winner)?;

        let n = state.n_items();
        let eps = self.epsilon;
        let cov_diff = state.diff_variance(i, j);
        let degenerate = cov_diff < SIGMA_DIFF_FLOOR * SIGMA_DIFF_FLOOR;

        let (mu, sigma, comparisons) = state.parts_mut();
        comparisons[(i, j)] += 1;

        let mu_diff = mu[i] - mu[j];
        let sigma_diff_sq = cov_diff.max(0.0) + eps * eps;
        let sigma_diff = sigma_diff_sq.sqrt();

        let z = mu_diff / sigma_diff;
        let (p_obs, dlnl_dz) = if winner == i {
            let cdf = normal_cdf(z);
            (cdf, normal_pdf(z) / (cdf + NUMERIC_FLOOR))
        } else {
            let cdf = normal_cdf(-z);
            (cdf, -normal_pdf(z) / (cdf + NUMERIC_FLOOR))
        };

        let dmu = dlnl_dz / sigma_diff;
        let step_i = (sigma[(i, i)] - sigma[(i, j)]) * dmu;
        let step_j = (sigma[(j, i)] - sigma[(j, j)]) * dmu;
        mu[i] += step_i;
        mu[j] += step_j;

        let info_gain =
            (normal_pdf(z) / (p_obs * (1.0 - p_obs) + NUMERIC_FLOOR)).powi(2) / sigma_diff_sq;

        let mut v = DVector::<f64>::zeros(n);
        v[i] = 1.0 / sigma_diff;
        v[j] = -1.0 / sigma_diff;

        let sigma_v = &*sigma * &v;
        let denom = 1.0 + info_gain * v.dot(&sigma_v);
        for c in 0..n {
            for r in 0..n {
                sigma[(r, c)] -= info_gain * (sigma_v[r] * sigma_v[c]) / denom;
            }
        }

        if degenerate {
            tracing::warn!(i, j, cov_diff, "difference variance collapsed during update");
        }
        tracing::debug!(i, j, winner, mu_diff, p_obs, info_gain, "updated beliefs");

        Ok(UpdateOutcome {
            i,
            j,
            winner,
            mu_diff,
            z,
            p_obs,
            info_gain,
            degenerate,
        })
    }
}

/// Apply one observed choice with choice-noise `epsilon`.
pub fn update_beliefs(
    state: &mut BeliefState,
    i: usize,
    j: usize,
    winner: usize,
    epsilon: f64,
) -> Result<UpdateOutcome, PreferenceError> {
    let updater = BeliefUpdater::new(epsilon)?;
    Ok(updater.update(state, i, j, winner)?)
}
