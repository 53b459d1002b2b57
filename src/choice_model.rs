//! Probit (Thurstone / Bradley-Terry style) choice model.
//!
//! P(i chosen over j) = Φ((μ_i − μ_j) / s) for a spread `s` that combines
//! belief uncertainty with the choice noise ε.

use std::f64::consts::{PI, SQRT_2};

use statrs::function::erf::erf;

/// Floor used inside logarithms and denominators wherever a probability
/// can reach exactly 0 or 1.
pub const NUMERIC_FLOOR: f64 = 1e-10;

/// Standard normal CDF Φ.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

/// Standard normal density φ.
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// Binary entropy in bits, with the logs guarded by [`NUMERIC_FLOOR`].
pub fn binary_entropy(p: f64) -> f64 {
    -p * (p + NUMERIC_FLOOR).log2() - (1.0 - p) * (1.0 - p + NUMERIC_FLOOR).log2()
}

/// Probability the first item is chosen given a mean difference and the
/// total spread of that difference.
pub fn win_probability(mu_diff: f64, spread: f64) -> f64 {
    normal_cdf(mu_diff / spread)
}
