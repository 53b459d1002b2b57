//! Stopping rule: every marginal posterior std dev below a threshold.

use crate::belief::BeliefState;

/// Largest marginal std dev across items.
pub fn max_uncertainty(state: &BeliefState) -> f64 {
    state
        .uncertainties()
        .into_iter()
        .fold(0.0_f64, f64::max)
}

/// True iff `max_i sqrt(sigma[i][i]) < threshold`.
pub fn check_convergence(state: &BeliefState, threshold: f64) -> bool {
    max_uncertainty(state) < threshold
}
