//! Gaussian belief over latent item preferences.
//!
//! A `BeliefState` holds the posterior mean `mu`, covariance `sigma`, and the
//! ordered comparison counts for a fixed set of `n` items. Shapes are fixed
//! at construction; only the updater mutates the numbers.

use std::cmp::Ordering;

use nalgebra::linalg::SymmetricEigen;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::validate_prior;
use crate::error::{ConfigurationError, PreferenceError, ValidationError};

/// Relative tolerance for the symmetry check on loaded covariances.
const SYMMETRY_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct BeliefState {
    mu: DVector<f64>,
    sigma: DMatrix<f64>,
    comparisons: DMatrix<u64>,
}

impl BeliefState {
    /// Prior belief: every mean at `prior_mean`, covariance `prior_variance * I`,
    /// no comparisons.
    pub fn new(
        n_items: usize,
        prior_mean: f64,
        prior_variance: f64,
    ) -> Result<Self, ConfigurationError> {
        validate_prior(n_items, prior_mean, prior_variance)?;
        Ok(Self {
            mu: DVector::from_element(n_items, prior_mean),
            sigma: DMatrix::identity(n_items, n_items) * prior_variance,
            comparisons: DMatrix::zeros(n_items, n_items),
        })
    }

    pub fn n_items(&self) -> usize {
        self.mu.len()
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    /// `comparisons[(i, j)]` counts trials recorded with `i` presented first.
    pub fn comparisons(&self) -> &DMatrix<u64> {
        &self.comparisons
    }

    /// Times the unordered pair {i, j} has been compared, in either order.
    pub fn times_compared(&self, i: usize, j: usize) -> u64 {
        self.comparisons[(i, j)] + self.comparisons[(j, i)]
    }

    pub fn total_comparisons(&self) -> u64 {
        self.comparisons.iter().sum()
    }

    /// Item indices sorted by posterior mean, best first. Equal means keep
    /// ascending index order.
    pub fn preference_ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.n_items()).collect();
        order.sort_by(|&a, &b| {
            self.mu[b]
                .partial_cmp(&self.mu[a])
                .unwrap_or(Ordering::Equal)
        });
        order
    }

    /// Marginal posterior standard deviation per item.
    pub fn uncertainties(&self) -> Vec<f64> {
        self.sigma
            .diagonal()
            .iter()
            .map(|v| v.max(0.0).sqrt())
            .collect()
    }

    /// Variance of `mu_i - mu_j` under the current covariance (no noise term).
    pub fn diff_variance(&self, i: usize, j: usize) -> f64 {
        self.sigma[(i, i)] + self.sigma[(j, j)] - 2.0 * self.sigma[(i, j)]
    }

    /// True when the smallest eigenvalue of `sigma` is at least `-tol`.
    pub fn is_positive_semidefinite(&self, tol: f64) -> bool {
        let eigen = SymmetricEigen::new(self.sigma.clone());
        eigen.eigenvalues.iter().all(|&ev| ev >= -tol)
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        let n_items = self.n_items();
        if index >= n_items {
            return Err(ValidationError::IndexOutOfRange { index, n_items });
        }
        Ok(())
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut DVector<f64>, &mut DMatrix<f64>, &mut DMatrix<u64>) {
        (&mut self.mu, &mut self.sigma, &mut self.comparisons)
    }

    /// Plain-array copy for a persistence layer.
    pub fn snapshot(&self) -> BeliefSnapshot {
        let n = self.n_items();
        let mut sigma = Vec::with_capacity(n * n);
        let mut comparisons = Vec::with_capacity(n * n);
        for r in 0..n {
            for c in 0..n {
                sigma.push(self.sigma[(r, c)]);
                comparisons.push(self.comparisons[(r, c)]);
            }
        }
        BeliefSnapshot {
            n_items: n,
            mu: self.mu.iter().copied().collect(),
            sigma,
            comparisons,
        }
    }

    /// Rebuild a belief from persisted arrays, checking shapes and the
    /// covariance invariants once.
    pub fn from_snapshot(snapshot: &BeliefSnapshot) -> Result<Self, PreferenceError> {
        let n = snapshot.n_items;
        if n < 2 {
            return Err(ConfigurationError::TooFewItems { n_items: n }.into());
        }
        check_len("mu", n, snapshot.mu.len())?;
        check_len("sigma", n * n, snapshot.sigma.len())?;
        check_len("comparisons", n * n, snapshot.comparisons.len())?;

        if snapshot.mu.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite { field: "mu" }.into());
        }
        if snapshot.sigma.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite { field: "sigma" }.into());
        }

        let sigma = DMatrix::from_row_slice(n, n, &snapshot.sigma);
        for r in 0..n {
            if sigma[(r, r)] <= 0.0 {
                return Err(ValidationError::NonPositiveVariance { index: r }.into());
            }
            for c in (r + 1)..n {
                let a = sigma[(r, c)];
                let b = sigma[(c, r)];
                let scale = a.abs().max(b.abs()).max(1.0);
                if (a - b).abs() > SYMMETRY_TOL * scale {
                    return Err(ValidationError::AsymmetricCovariance { row: r, col: c }.into());
                }
            }
        }

        Ok(Self {
            mu: DVector::from_column_slice(&snapshot.mu),
            sigma,
            comparisons: DMatrix::from_row_slice(n, n, &snapshot.comparisons),
        })
    }
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), ValidationError> {
    if expected != actual {
        return Err(ValidationError::DimensionMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

pub fn new_belief_state(
    n_items: usize,
    prior_mean: f64,
    prior_variance: f64,
) -> Result<BeliefState, ConfigurationError> {
    BeliefState::new(n_items, prior_mean, prior_variance)
}

pub fn preference_ranking(state: &BeliefState) -> Vec<usize> {
    state.preference_ranking()
}

/// Row-major plain arrays of a [`BeliefState`]. The persistence layer owns
/// the wire format; round-tripping must keep every `f64` bit-exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefSnapshot {
    pub n_items: usize,
    pub mu: Vec<f64>,
    /// `n_items * n_items` entries, row-major.
    pub sigma: Vec<f64>,
    /// `n_items * n_items` entries, row-major; `[i * n + j]` is i-first-vs-j.
    pub comparisons: Vec<u64>,
}
