//! Drives a rollout check to its verdict.
//!
//! The evaluator classifies the application status against the reference
//! snapshots for the expected revision:
//!
//! ```text
//! Initial ──skip──────────────────────────────► Terminal(Skip)
//!    │
//!    └─► Polling ──failed────────────────────► Terminal(Failure)
//!          │  ▲   ──skip──────────────────────► Terminal(Skip)
//!          │  └── unavailable / unrecognised
//!          └──progressing──► restart check ──► Terminal(Success | Failure)
//! ```
//!
//! Each evaluator produces at most one verdict; once terminal it is never
//! re-evaluated.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use rollwatch_cache::{CacheBackend, VerdictStore};
use rollwatch_core::{ReferenceSnapshots, Revision, SnapshotClass, Verdict};
use rollwatch_probe::ProbeError;

use crate::error::{EvaluationError, EvaluationResult};
use crate::observer::RolloutObserver;

/// Where the evaluator is in its check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorPhase {
    /// Not started, or fetching the first snapshot.
    Initial,
    /// Re-polling the application status. `polls` counts fetches so far.
    Polling { polls: u32 },
    /// Verdict reached.
    Terminal(Verdict),
}

/// Poll loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait before each status poll.
    pub interval: Duration,
    /// Abandon the check if no terminal state is reached in time.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

enum PollExit {
    Verdict(Verdict),
    Progressing,
}

/// Decides the verdict for one rollout of one service.
pub struct RolloutEvaluator<O> {
    service: String,
    observer: O,
    references: ReferenceSnapshots,
    poll: PollSettings,
    phase: EvaluatorPhase,
}

impl<O: RolloutObserver> RolloutEvaluator<O> {
    pub fn new(service: &str, observer: O, expected: Revision, poll: PollSettings) -> Self {
        Self {
            service: service.to_string(),
            observer,
            references: ReferenceSnapshots::new(expected),
            poll,
            phase: EvaluatorPhase::Initial,
        }
    }

    pub fn phase(&self) -> EvaluatorPhase {
        self.phase
    }

    /// Run the check until a verdict is reached, the deadline passes or
    /// `shutdown` flips to `true`.
    ///
    /// Calling this again after a verdict returns the same verdict without
    /// touching the cluster.
    pub async fn evaluate(&mut self, mut shutdown: watch::Receiver<bool>) -> EvaluationResult<Verdict> {
        if let EvaluatorPhase::Terminal(verdict) = self.phase {
            return Ok(verdict);
        }

        let service = self.service.clone();
        tokio::select! {
            result = self.drive() => result,
            _ = cancelled(&mut shutdown) => {
                warn!(%service, "rollout check cancelled");
                Err(EvaluationError::Cancelled)
            }
        }
    }

    /// Evaluate, then hand the verdict to `store`.
    ///
    /// Consumes the evaluator so a check persists at most once.
    pub async fn run<B: CacheBackend>(
        mut self,
        store: &mut VerdictStore<B>,
        build_id: &str,
        shutdown: watch::Receiver<bool>,
    ) -> EvaluationResult<Verdict> {
        let verdict = self.evaluate(shutdown).await?;
        store.persist(&self.service, build_id, verdict).await?;
        Ok(verdict)
    }

    async fn drive(&mut self) -> EvaluationResult<Verdict> {
        let exit = match self.poll.timeout {
            None => self.poll_status().await,
            Some(limit) => {
                let result = tokio::time::timeout(limit, self.poll_status()).await;
                match result {
                    Ok(exit) => exit,
                    Err(_) => {
                        let polls = self.polls();
                        warn!(service = %self.service, ?limit, polls, "rollout did not settle in time");
                        return Err(EvaluationError::DeadlineExceeded { limit, polls });
                    }
                }
            }
        };

        let verdict = match exit {
            PollExit::Verdict(verdict) => verdict,
            PollExit::Progressing => self.inspect_containers().await?,
        };

        self.phase = EvaluatorPhase::Terminal(verdict);
        info!(service = %self.service, ?verdict, "rollout verdict");
        Ok(verdict)
    }

    fn polls(&self) -> u32 {
        match self.phase {
            EvaluatorPhase::Polling { polls } => polls,
            _ => 0,
        }
    }

    async fn poll_status(&mut self) -> PollExit {
        self.phase = EvaluatorPhase::Initial;
        info!(
            service = %self.service,
            revision = %self.references.expected_revision(),
            "checking application status"
        );

        match self.observer.status().await {
            Ok(snapshot) => {
                info!(%snapshot, "initial application status");
                if self.references.classify(&snapshot) == Some(SnapshotClass::Skip) {
                    info!(service = %self.service, "application not changed");
                    return PollExit::Verdict(Verdict::Skip);
                }
            }
            Err(e) => warn!(error = %e, "initial application status unavailable"),
        }

        info!(service = %self.service, interval = ?self.poll.interval, "start rollout checks");
        let mut polls = 0;
        loop {
            polls += 1;
            self.phase = EvaluatorPhase::Polling { polls };
            tokio::time::sleep(self.poll.interval).await;

            let snapshot = match self.observer.status().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(poll = polls, error = %e, "application status unavailable, polling again");
                    continue;
                }
            };

            match self.references.classify(&snapshot) {
                Some(SnapshotClass::Failed) => {
                    warn!(service = %self.service, %snapshot, "rollout failed to sync");
                    return PollExit::Verdict(Verdict::Failure);
                }
                Some(SnapshotClass::Skip) => {
                    info!(service = %self.service, %snapshot, "rollout already healthy");
                    return PollExit::Verdict(Verdict::Skip);
                }
                Some(SnapshotClass::Progressing) => {
                    info!(service = %self.service, %snapshot, "rollout paused for inspection");
                    return PollExit::Progressing;
                }
                None => debug!(poll = polls, %snapshot, "rollout not settled"),
            }
        }
    }

    async fn inspect_containers(&self) -> EvaluationResult<Verdict> {
        let service = self.service.as_str();
        let replica_set_error = |which: &'static str, source: ProbeError| EvaluationError::ReplicaSet {
            service: service.to_string(),
            which,
            source,
        };

        let stable = self
            .observer
            .stable_replica_set(service)
            .await
            .map_err(|e| replica_set_error("stable", e))?;
        let new_rs = self
            .observer
            .new_replica_set(service)
            .await
            .map_err(|e| replica_set_error("new", e))?;
        info!(
            service,
            stable_rs = %stable,
            new_rs = %new_rs,
            revision = %self.references.expected_revision(),
            "checking containers of new replica-set"
        );

        let restarts = match self.observer.restart_counts(service, &new_rs).await {
            Ok(restarts) => restarts,
            Err(e) => {
                error!(service, error = %e, "container statuses unavailable, failing rollout");
                return Ok(Verdict::Failure);
            }
        };

        if restarts.is_empty() {
            warn!(service, new_rs = %new_rs, "no containers found for new replica-set");
        }
        for (container, count) in restarts.restarted() {
            warn!(service, container, restarts = count, "container restarted");
        }
        Ok(restarts.verdict())
    }
}

/// Resolves once shutdown is requested. A dropped sender never cancels.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
