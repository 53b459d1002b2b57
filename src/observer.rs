//! Injected observation hooks for sessions.
//!
//! The engine never installs global logging state. Hosts that want trial
//! events, degeneracy warnings, or completion notices pass a
//! [`SessionObserver`] into the session; tests can pass a
//! [`RecordingObserver`] and inspect what happened.

use std::sync::Mutex;

use serde::Serialize;

use crate::session::StopReason;

/// A recorded trial, after the belief update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialEvent {
    pub trial: usize,
    pub item_a: usize,
    pub item_b: usize,
    pub winner: usize,
    pub response_time_ms: Option<u64>,
    pub p_obs: f64,
    pub info_gain: f64,
    pub max_uncertainty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneracySource {
    Selection,
    Update,
}

/// Pairs whose difference spread had to be floored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegeneracyEvent {
    /// Trial number the event belongs to (the upcoming one for selection).
    pub trial: usize,
    pub source: DegeneracySource,
    pub pairs: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionEvent {
    pub trials_completed: usize,
    pub stop_reason: StopReason,
    pub max_uncertainty: f64,
    pub ranking: Vec<usize>,
}

/// Any event a session can emit, tagged for line-oriented sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    Trial(TrialEvent),
    Degeneracy(DegeneracyEvent),
    Complete(CompletionEvent),
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("{0}")]
    Message(String),
}

/// Receives session events synchronously, in order. Errors are logged by
/// the session and never undo the trial that produced the event.
pub trait SessionObserver: Send + Sync {
    fn on_trial(&self, event: &TrialEvent) -> Result<(), ObserverError>;

    fn on_degeneracy(&self, _event: &DegeneracyEvent) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_complete(&self, _event: &CompletionEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_trial(&self, _event: &TrialEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Re-emits events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_trial(&self, event: &TrialEvent) -> Result<(), ObserverError> {
        tracing::info!(
            trial = event.trial,
            item_a = event.item_a,
            item_b = event.item_b,
            winner = event.winner,
            response_time_ms = ?event.response_time_ms,
            max_uncertainty = event.max_uncertainty,
            "trial recorded"
        );
        Ok(())
    }

    fn on_degeneracy(&self, event: &DegeneracyEvent) -> Result<(), ObserverError> {
        tracing::warn!(
            trial = event.trial,
            source = ?event.source,
            pairs = ?event.pairs,
            "numeric degeneracy floored"
        );
        Ok(())
    }

    fn on_complete(&self, event: &CompletionEvent) -> Result<(), ObserverError> {
        tracing::info!(
            trials = event.trials_completed,
            stop_reason = ?event.stop_reason,
            max_uncertainty = event.max_uncertainty,
            "session complete"
        );
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn trials(&self) -> Vec<TrialEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Trial(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SessionEvent) -> Result<(), ObserverError> {
        self.events
            .lock()
            .map_err(|_| ObserverError::Message("recording observer lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

impl SessionObserver for RecordingObserver {
    fn on_trial(&self, event: &TrialEvent) -> Result<(), ObserverError> {
        self.push(SessionEvent::Trial(event.clone()))
    }

    fn on_degeneracy(&self, event: &DegeneracyEvent) -> Result<(), ObserverError> {
        self.push(SessionEvent::Degeneracy(event.clone()))
    }

    fn on_complete(&self, event: &CompletionEvent) -> Result<(), ObserverError> {
        self.push(SessionEvent::Complete(event.clone()))
    }
}
