//! Argo CD application status queries.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use rollwatch_core::{HealthStatus, OperationPhase, Revision, StatusSnapshot, SyncStatus};

use crate::error::{ProbeError, ProbeResult, Unavailable};
use crate::retry::RetryPolicy;
use crate::runner::CommandRunner;

/// Where and how to reach the Argo CD application.
#[derive(Clone)]
pub struct ArgoCdTarget {
    /// Path or name of the `argocd` binary.
    pub binary: String,
    pub app: String,
    pub token: String,
    pub server: String,
}

impl std::fmt::Debug for ArgoCdTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgoCdTarget")
            .field("binary", &self.binary)
            .field("app", &self.app)
            .field("token", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

impl ArgoCdTarget {
    fn app_get_args(&self) -> Vec<String> {
        [
            "app",
            "get",
            self.app.as_str(),
            "--auth-token",
            self.token.as_str(),
            "--server",
            self.server.as_str(),
            "--output",
            "json",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

#[derive(Deserialize)]
struct ApplicationDoc {
    status: ApplicationStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationStatus {
    sync: SyncBlock,
    health: HealthBlock,
    operation_state: OperationStateBlock,
}

#[derive(Deserialize)]
struct SyncBlock {
    status: SyncStatus,
    revision: String,
}

#[derive(Deserialize)]
struct HealthBlock {
    status: HealthStatus,
}

#[derive(Deserialize)]
struct OperationStateBlock {
    phase: OperationPhase,
}

/// Decode `argocd app get -o json` output into a snapshot.
pub fn parse_application_status(json: &str) -> ProbeResult<StatusSnapshot> {
    let doc: ApplicationDoc =
        serde_json::from_str(json).map_err(|source| ProbeError::MalformedResponse {
            what: "application",
            source,
        })?;
    let status = doc.status;
    Ok(StatusSnapshot::new(
        status.sync.status,
        status.health.status,
        status.operation_state.phase,
        Revision::short(&status.sync.revision),
    ))
}

/// Fetches the current [`StatusSnapshot`] of an application.
pub struct StatusFetcher<R> {
    runner: Arc<R>,
    target: ArgoCdTarget,
    retry: RetryPolicy,
}

impl<R: CommandRunner> StatusFetcher<R> {
    pub fn new(runner: Arc<R>, target: ArgoCdTarget, retry: RetryPolicy) -> Self {
        Self {
            runner,
            target,
            retry,
        }
    }

    /// Query the application status, retrying per the policy.
    ///
    /// Every failure mode collapses into [`Unavailable`] once the attempts
    /// are spent.
    pub async fn fetch(&self) -> Result<StatusSnapshot, Unavailable> {
        let args = &self.target.app_get_args();
        self.retry
            .run("application status", move || async move {
                let stdout = self
                    .runner
                    .run("application status", &self.target.binary, args)
                    .await?;
                let snapshot = parse_application_status(&stdout)?;
                debug!(app = %self.target.app, %snapshot, "application status");
                Ok::<_, ProbeError>(snapshot)
            })
            .await
    }
}
