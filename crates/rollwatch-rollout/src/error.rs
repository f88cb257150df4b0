//! Evaluation error types.

use std::time::Duration;

use thiserror::Error;

use rollwatch_cache::CacheError;
use rollwatch_probe::ProbeError;

/// Result type alias for rollout evaluation.
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Ways a rollout check ends without a persisted verdict.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to resolve {which} replica-set of {service}: {source}")]
    ReplicaSet {
        service: String,
        which: &'static str,
        source: ProbeError,
    },

    #[error("rollout did not reach a terminal state within {limit:?} ({polls} polls)")]
    DeadlineExceeded { limit: Duration, polls: u32 },

    #[error("rollout check cancelled")]
    Cancelled,

    #[error("failed to persist verdict: {0}")]
    Persist(#[from] CacheError),
}
