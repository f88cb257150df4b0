//! Process exit codes.

use std::process::ExitCode;

use rollwatch_cache::CacheError;
use rollwatch_rollout::EvaluationError;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A verdict was reached (and persisted, unless dry run). Exit 0.
    Verdict,
    /// No verdict stored for the requested build. Exit 1.
    Absent,
    /// Bad or missing configuration. Exit 2.
    Config,
    /// Replica-set resolution failed. Exit 3.
    Query,
    /// The cache could not be reached or written. Exit 4.
    Cache,
    /// The rollout did not settle before the deadline. Exit 5.
    Deadline,
    /// Interrupted. Exit 6.
    Cancelled,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Verdict => 0,
            Outcome::Absent => 1,
            Outcome::Config => 2,
            Outcome::Query => 3,
            Outcome::Cache => 4,
            Outcome::Deadline => 5,
            Outcome::Cancelled => 6,
        }
    }

    /// Map a failed invocation to its outcome. Errors of unknown origin
    /// count as configuration errors.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<EvaluationError>() {
            return match e {
                EvaluationError::ReplicaSet { .. } => Outcome::Query,
                EvaluationError::DeadlineExceeded { .. } => Outcome::Deadline,
                EvaluationError::Cancelled => Outcome::Cancelled,
                EvaluationError::Persist(_) => Outcome::Cache,
            };
        }
        if err.downcast_ref::<CacheError>().is_some() {
            return Outcome::Cache;
        }
        // ConfigError, and anything unexpected.
        Outcome::Config
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}
