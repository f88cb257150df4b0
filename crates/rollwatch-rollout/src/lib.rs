//! rollwatch-rollout — deciding whether a rollout succeeded.
//!
//! A [`RolloutEvaluator`] polls the application status until it matches a
//! reference snapshot for the expected revision, gates a paused rollout on
//! container restarts, and yields a single [`Verdict`](rollwatch_core::Verdict)
//! which [`RolloutEvaluator::run`] persists.
//!
//! # Components
//!
//! - **`observer`** — the evaluator's view of the cluster ([`RolloutObserver`])
//! - **`evaluator`** — the polling state machine
//! - **`error`** — ways a check ends without a verdict

pub mod error;
pub mod evaluator;
pub mod observer;

pub use error::{EvaluationError, EvaluationResult};
pub use evaluator::{EvaluatorPhase, PollSettings, RolloutEvaluator};
pub use observer::{ClusterObserver, RolloutObserver};
