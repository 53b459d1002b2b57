//! Trial-loop orchestration for one experiment session.
//!
//! A session owns its belief exclusively and moves through
//! `Active -> Complete`. It completes when the trial cap is reached or the
//! belief converges after an update (or is already converged at start).
//! Calls on one session must be serialized by the host; separate sessions
//! share nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::belief::{BeliefSnapshot, BeliefState};
use crate::config::{QualityCriteria, SessionConfig};
use crate::convergence::{check_convergence, max_uncertainty};
use crate::error::{ConfigurationError, PreferenceError, ValidationError};
use crate::observer::{
    CompletionEvent, DegeneracyEvent, DegeneracySource, NoopObserver, ObserverError,
    SessionObserver, TrialEvent,
};
use crate::quality::{evaluate_quality, QualityReport};
use crate::selector::{PairSelector, Selection};
use crate::updater::BeliefUpdater;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_trials` choices were recorded.
    MaxTrials,
    /// Every marginal std dev fell below the convergence threshold.
    Converged,
}

/// One recorded choice. Trials are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub trial: usize,
    pub item_a: usize,
    pub item_b: usize,
    pub winner: usize,
    pub response_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResults {
    pub trials_completed: usize,
    pub status: SessionStatus,
    pub stop_reason: Option<StopReason>,
    pub converged: bool,
    /// Item indices, most preferred first.
    pub ranking: Vec<usize>,
    /// Posterior mean per item.
    pub preferences: Vec<f64>,
    /// Posterior std dev per item.
    pub uncertainties: Vec<f64>,
    pub choices: Vec<ChoiceRecord>,
}

pub struct PreferenceSession {
    config: SessionConfig,
    state: BeliefState,
    selector: PairSelector,
    updater: BeliefUpdater,
    choices: Vec<ChoiceRecord>,
    status: SessionStatus,
    stop_reason: Option<StopReason>,
    observer: Arc<dyn SessionObserver>,
}

impl std::fmt::Debug for PreferenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceSession")
            .field("config", &self.config)
            .field("trials_completed", &self.choices.len())
            .field("status", &self.status)
            .field("stop_reason", &self.stop_reason)
            .finish_non_exhaustive()
    }
}

impl PreferenceSession {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigurationError> {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let state = BeliefState::new(config.n_items, config.prior_mean, config.prior_variance)?;
        let selector = PairSelector::new(config.selector)?;
        let updater = BeliefUpdater::new(config.selector.epsilon)?;

        tracing::info!(
            n_items = config.n_items,
            max_trials = config.max_trials,
            prior_mean = config.prior_mean,
            prior_variance = config.prior_variance,
            "session started"
        );

        let mut session = Self {
            config,
            state,
            selector,
            updater,
            choices: Vec::new(),
            status: SessionStatus::Active,
            stop_reason: None,
            observer,
        };
        session.refresh_status();
        Ok(session)
    }

    /// Rebuild a session from a persisted belief and its choice log.
    pub fn resume(
        config: SessionConfig,
        snapshot: &BeliefSnapshot,
        choices: Vec<ChoiceRecord>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, PreferenceError> {
        config.validate()?;
        let state = BeliefState::from_snapshot(snapshot)?;
        if state.n_items() != config.n_items {
            return Err(ValidationError::DimensionMismatch {
                field: "n_items",
                expected: config.n_items,
                actual: state.n_items(),
            }
            .into());
        }
        let recorded = state.total_comparisons() as usize;
        if recorded != choices.len() {
            return Err(ValidationError::DimensionMismatch {
                field: "choices",
                expected: recorded,
                actual: choices.len(),
            }
            .into());
        }
        for c in &choices {
            BeliefUpdater::validate_trial(&state, c.item_a, c.item_b, c.winner)?;
        }

        let mut session = Self {
            selector: PairSelector::new(config.selector)?,
            updater: BeliefUpdater::new(config.selector.epsilon)?,
            config,
            state,
            choices,
            status: SessionStatus::Active,
            stop_reason: None,
            observer,
        };
        session.refresh_status();
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &BeliefState {
        &self.state
    }

    pub fn into_state(self) -> BeliefState {
        self.state
    }

    pub fn choices(&self) -> &[ChoiceRecord] {
        &self.choices
    }

    pub fn trials_completed(&self) -> usize {
        self.choices.len()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    /// Fraction of the trial cap used, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        (self.trials_completed() as f64 / self.config.max_trials as f64).min(1.0)
    }

    /// Next pair to present, or `None` once the session is complete.
    pub fn get_next_pair(&self) -> Option<(usize, usize)> {
        self.next_selection().map(|s| s.pair())
    }

    /// Like [`get_next_pair`](Self::get_next_pair) but with the score breakdown.
    pub fn next_selection(&self) -> Option<Selection> {
        if self.is_complete() {
            return None;
        }
        let selection = self.selector.select(&self.state);
        if !selection.degenerate_pairs.is_empty() {
            let event = DegeneracyEvent {
                trial: self.trials_completed() + 1,
                source: DegeneracySource::Selection,
                pairs: selection.degenerate_pairs.clone(),
            };
            self.notify("on_degeneracy", |o| o.on_degeneracy(&event));
        }
        Some(selection)
    }

    /// Record the choice between `i` (presented first) and `j`.
    pub fn record_choice(
        &mut self,
        i: usize,
        j: usize,
        winner: usize,
        response_time_ms: Option<u64>,
    ) -> Result<SessionStatus, ValidationError> {
        if self.is_complete() {
            return Err(ValidationError::SessionComplete);
        }
        let outcome = self.updater.update(&mut self.state, i, j, winner)?;

        let trial = self.trials_completed() + 1;
        self.choices.push(ChoiceRecord {
            trial,
            item_a: i,
            item_b: j,
            winner,
            response_time_ms,
        });

        if outcome.degenerate {
            let event = DegeneracyEvent {
                trial,
                source: DegeneracySource::Update,
                pairs: vec![(i, j)],
            };
            self.notify("on_degeneracy", |o| o.on_degeneracy(&event));
        }

        let event = TrialEvent {
            trial,
            item_a: i,
            item_b: j,
            winner,
            response_time_ms,
            p_obs: outcome.p_obs,
            info_gain: outcome.info_gain,
            max_uncertainty: max_uncertainty(&self.state),
        };
        tracing::debug!(trial, i, j, winner, "choice recorded");
        self.notify("on_trial", |o| o.on_trial(&event));

        self.refresh_status();
        Ok(self.status)
    }

    /// Drive the loop to completion, asking `choose(i, j)` for each winner.
    pub fn run_to_completion(
        &mut self,
        mut choose: impl FnMut(usize, usize) -> usize,
    ) -> Result<SessionResults, ValidationError> {
        while let Some((i, j)) = self.get_next_pair() {
            let winner = choose(i, j);
            self.record_choice(i, j, winner, None)?;
        }
        Ok(self.results())
    }

    pub fn results(&self) -> SessionResults {
        SessionResults {
            trials_completed: self.trials_completed(),
            status: self.status,
            stop_reason: self.stop_reason,
            converged: check_convergence(&self.state, self.config.convergence_threshold),
            ranking: self.state.preference_ranking(),
            preferences: self.state.mu().iter().copied().collect(),
            uncertainties: self.state.uncertainties(),
            choices: self.choices.clone(),
        }
    }

    pub fn evaluate_quality(
        &self,
        criteria: &QualityCriteria,
    ) -> Result<QualityReport, ConfigurationError> {
        evaluate_quality(&self.choices, self.trials_completed(), criteria)
    }

    fn refresh_status(&mut self) {
        if self.is_complete() {
            return;
        }
        let reason = if check_convergence(&self.state, self.config.convergence_threshold) {
            StopReason::Converged
        } else if self.trials_completed() >= self.config.max_trials {
            StopReason::MaxTrials
        } else {
            return;
        };

        self.status = SessionStatus::Complete;
        self.stop_reason = Some(reason);

        let event = CompletionEvent {
            trials_completed: self.trials_completed(),
            stop_reason: reason,
            max_uncertainty: max_uncertainty(&self.state),
            ranking: self.state.preference_ranking(),
        };
        tracing::info!(
            trials = event.trials_completed,
            stop_reason = ?reason,
            max_uncertainty = event.max_uncertainty,
            "session complete"
        );
        self.notify("on_complete", |o| o.on_complete(&event));
    }

    fn notify(
        &self,
        hook: &'static str,
        f: impl FnOnce(&dyn SessionObserver) -> Result<(), ObserverError>,
    ) {
        if let Err(e) = f(self.observer.as_ref()) {
            tracing::warn!(hook, error = %e, "session observer failed");
        }
    }
}
