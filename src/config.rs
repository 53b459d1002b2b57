//! Session and selector configuration.
//!
//! Every struct here is plain data with a `Default` and a `validate()` that
//! is run once when a belief or session is built. Downstream operations
//! assume validated values and do not re-check them.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Tuning for the choice model and the pair selector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Noise scale ε of the probit choice model. Added to the difference
    /// spread in selection and as ε² to the difference variance in updates.
    /// Must be > 0.
    pub epsilon: f64,
    /// Weight of the under-sampling bonus `w / (1 + times compared)`.
    /// 0.0 disables exploration entirely.
    pub exploration_weight: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            exploration_weight: 0.1,
        }
    }
}

impl SelectorConfig {
    pub fn new(epsilon: f64, exploration_weight: f64) -> Result<Self, ConfigurationError> {
        let cfg = Self {
            epsilon,
            exploration_weight,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.epsilon.is_finite() {
            return Err(ConfigurationError::NonFinite { field: "epsilon" });
        }
        if self.epsilon <= 0.0 {
            return Err(ConfigurationError::NonPositiveEpsilon(self.epsilon));
        }
        if !self.exploration_weight.is_finite() {
            return Err(ConfigurationError::NonFinite {
                field: "exploration_weight",
            });
        }
        if self.exploration_weight < 0.0 {
            return Err(ConfigurationError::NegativeExplorationWeight(
                self.exploration_weight,
            ));
        }
        Ok(())
    }
}

/// Configuration for one experiment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of items being compared. Fixed for the session's lifetime.
    pub n_items: usize,

    // -- Stopping ------------------------------------------------------------

    /// Hard cap on recorded trials.
    pub max_trials: usize,
    /// The session completes once every marginal std dev is below this.
    pub convergence_threshold: f64,

    // -- Prior ---------------------------------------------------------------

    /// Prior mean preference shared by every item.
    pub prior_mean: f64,
    /// Prior variance; the prior covariance is `prior_variance * I`.
    pub prior_variance: f64,

    pub selector: SelectorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            n_items: 2,
            max_trials: 50,
            convergence_threshold: 0.05,
            prior_mean: 0.0,
            prior_variance: 1.0,
            selector: SelectorConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults for `n_items` items. Not validated until used.
    pub fn new(n_items: usize) -> Self {
        Self {
            n_items,
            ..Self::default()
        }
    }

    pub fn with_max_trials(mut self, max_trials: usize) -> Self {
        self.max_trials = max_trials;
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_prior(mut self, prior_mean: f64, prior_variance: f64) -> Self {
        self.prior_mean = prior_mean;
        self.prior_variance = prior_variance;
        self
    }

    pub fn with_selector(mut self, selector: SelectorConfig) -> Self {
        self.selector = selector;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_prior(self.n_items, self.prior_mean, self.prior_variance)?;
        if self.max_trials == 0 {
            return Err(ConfigurationError::ZeroMaxTrials);
        }
        if !self.convergence_threshold.is_finite() {
            return Err(ConfigurationError::NonFinite {
                field: "convergence_threshold",
            });
        }
        if self.convergence_threshold <= 0.0 {
            return Err(ConfigurationError::NonPositiveThreshold(
                self.convergence_threshold,
            ));
        }
        self.selector.validate()
    }
}

pub(crate) fn validate_prior(
    n_items: usize,
    prior_mean: f64,
    prior_variance: f64,
) -> Result<(), ConfigurationError> {
    if n_items < 2 {
        return Err(ConfigurationError::TooFewItems { n_items });
    }
    if !prior_mean.is_finite() {
        return Err(ConfigurationError::NonFinite {
            field: "prior_mean",
        });
    }
    if !prior_variance.is_finite() {
        return Err(ConfigurationError::NonFinite {
            field: "prior_variance",
        });
    }
    if prior_variance <= 0.0 {
        return Err(ConfigurationError::NonPositivePriorVariance(prior_variance));
    }
    Ok(())
}

/// Exclusion criteria applied to a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityCriteria {
    /// Sessions with fewer recorded trials are flagged.
    pub min_trials: usize,
    /// Minimum fraction of attention checks answered correctly.
    pub attention_min_rate: f64,
    /// Items whose selection is the known-correct answer whenever presented.
    pub attention_items: Vec<usize>,
}

impl Default for QualityCriteria {
    fn default() -> Self {
        Self {
            min_trials: 0,
            attention_min_rate: 0.75,
            attention_items: Vec::new(),
        }
    }
}

impl QualityCriteria {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.attention_min_rate) {
            return Err(ConfigurationError::InvalidAttentionRate(
                self.attention_min_rate,
            ));
        }
        Ok(())
    }
}
