//! The evaluator's view of the cluster.

use std::future::Future;
use std::sync::Arc;

use rollwatch_core::{RestartMap, StatusSnapshot};
use rollwatch_probe::{CommandRunner, Kubectl, ProbeResult, StatusFetcher, Unavailable};

/// Everything the evaluator needs to observe about a rollout.
pub trait RolloutObserver: Send + Sync {
    /// Current application status, already retried.
    fn status(&self) -> impl Future<Output = Result<StatusSnapshot, Unavailable>> + Send;

    /// Hash of the stable replica-set. Single shot.
    fn stable_replica_set(&self, service: &str)
    -> impl Future<Output = ProbeResult<String>> + Send;

    /// Hash of the replica-set being rolled out. Single shot.
    fn new_replica_set(&self, service: &str) -> impl Future<Output = ProbeResult<String>> + Send;

    /// Restart counts of the replica-set's containers, already retried.
    fn restart_counts(
        &self,
        service: &str,
        replica_set: &str,
    ) -> impl Future<Output = Result<RestartMap, Unavailable>> + Send;
}

/// Observes a live cluster through the `argocd` and `kubectl` CLIs.
pub struct ClusterObserver<R> {
    status: StatusFetcher<R>,
    kubectl: Kubectl<R>,
}

impl<R: CommandRunner> ClusterObserver<R> {
    pub fn new(status: StatusFetcher<R>, kubectl: Kubectl<R>) -> Self {
        Self { status, kubectl }
    }
}

impl<R: CommandRunner> RolloutObserver for ClusterObserver<R> {
    async fn status(&self) -> Result<StatusSnapshot, Unavailable> {
        self.status.fetch().await
    }

    async fn stable_replica_set(&self, service: &str) -> ProbeResult<String> {
        self.kubectl.stable_replica_set(service).await
    }

    async fn new_replica_set(&self, service: &str) -> ProbeResult<String> {
        self.kubectl.new_replica_set(service).await
    }

    async fn restart_counts(
        &self,
        _service: &str,
        replica_set: &str,
    ) -> Result<RestartMap, Unavailable> {
        self.kubectl.restart_counts(replica_set).await
    }
}

impl<T: RolloutObserver> RolloutObserver for Arc<T> {
    fn status(&self) -> impl Future<Output = Result<StatusSnapshot, Unavailable>> + Send {
        (**self).status()
    }

    fn stable_replica_set(
        &self,
        service: &str,
    ) -> impl Future<Output = ProbeResult<String>> + Send {
        (**self).stable_replica_set(service)
    }

    fn new_replica_set(&self, service: &str) -> impl Future<Output = ProbeResult<String>> + Send {
        (**self).new_replica_set(service)
    }

    fn restart_counts(
        &self,
        service: &str,
        replica_set: &str,
    ) -> impl Future<Output = Result<RestartMap, Unavailable>> + Send {
        (**self).restart_counts(service, replica_set)
    }
}
