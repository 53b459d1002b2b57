//! Error types for belief construction, pair selection, and updates.

use thiserror::Error;

/// Malformed session or selector configuration. Fatal to the call that
/// received it; callers must not start a session with these values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("at least two items are required, got {n_items}")]
    TooFewItems { n_items: usize },

    #[error("epsilon must be > 0, got {0}")]
    NonPositiveEpsilon(f64),

    #[error("exploration_weight must be >= 0, got {0}")]
    NegativeExplorationWeight(f64),

    #[error("prior_variance must be > 0, got {0}")]
    NonPositivePriorVariance(f64),

    #[error("{field} must be finite")]
    NonFinite { field: &'static str },

    #[error("max_trials must be at least 1")]
    ZeroMaxTrials,

    #[error("convergence_threshold must be > 0, got {0}")]
    NonPositiveThreshold(f64),

    #[error("attention_min_rate must lie in [0, 1], got {0}")]
    InvalidAttentionRate(f64),
}

/// Invalid input handed to a selector, updater, or session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("winner {winner} must be either {i} or {j}")]
    WinnerNotInPair { winner: usize, i: usize, j: usize },

    #[error("item index {index} out of range (n_items = {n_items})")]
    IndexOutOfRange { index: usize, n_items: usize },

    #[error("item {index} cannot be compared with itself")]
    SelfComparison { index: usize },

    #[error("{field}: expected {expected} values, got {actual}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} contains a non-finite value")]
    NonFinite { field: &'static str },

    #[error("covariance is not symmetric at ({row}, {col})")]
    AsymmetricCovariance { row: usize, col: usize },

    #[error("marginal variance of item {index} must be > 0")]
    NonPositiveVariance { index: usize },

    #[error("session is already complete")]
    SessionComplete,
}

/// Umbrella error for callers that drive the whole engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreferenceError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}
