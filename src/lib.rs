#![forbid(unsafe_code)]

//! # bayes-pref
//!
//! Adaptive pairwise preference learning.
//!
//! A session keeps a Gaussian belief over the latent preference score of
//! each of `n` items. Each trial it picks the pair whose outcome is most
//! informative under a probit choice model, records which item the
//! participant chose, and folds that choice into the belief with a
//! Laplace-approximated update and a rank-one covariance downdate. It stops
//! at a trial cap or once every item's posterior std dev is below a
//! threshold.
//!
//! The engine is synchronous and does no I/O. Hosts observe sessions
//! through an injected [`SessionObserver`] and persist beliefs through
//! [`BeliefSnapshot`].

pub mod belief;
pub mod choice_model;
pub mod config;
pub mod convergence;
pub mod error;
pub mod evaluation;
pub mod observer;
pub mod quality;
pub mod selector;
pub mod session;
pub mod trace;
pub mod updater;

pub use belief::{new_belief_state, preference_ranking, BeliefSnapshot, BeliefState};
pub use config::{QualityCriteria, SelectorConfig, SessionConfig};
pub use convergence::{check_convergence, max_uncertainty};
pub use error::{ConfigurationError, PreferenceError, ValidationError};
pub use observer::{
    CompletionEvent, DegeneracyEvent, DegeneracySource, NoopObserver, ObserverError,
    RecordingObserver, SessionEvent, SessionObserver, TracingObserver, TrialEvent,
};
pub use quality::{evaluate_quality, ExclusionReason, QualityReport};
pub use selector::{select_next_pair, PairScore, PairSelector, Selection};
pub use session::{ChoiceRecord, PreferenceSession, SessionResults, SessionStatus, StopReason};
pub use trace::{JsonlTraceSink, TraceError, TraceRecord, TraceWorker};
pub use updater::{update_beliefs, BeliefUpdater, UpdateOutcome};
