//! rollwatch-probe — querying the deployment and container orchestrators.
//!
//! Every query shells out to the orchestrator's CLI through a
//! [`CommandRunner`] and decodes the JSON output into typed values.
//!
//! ```text
//! StatusFetcher ── argocd app get ──────────────► StatusSnapshot
//! Kubectl ──────── kubectl get rollouts ────────► stable / new replica-set
//!          └────── kubectl get pods -l <hash> ──► RestartMap
//! ```
//!
//! Status and restart queries are retried with a fixed delay
//! ([`RetryPolicy`]) and report [`Unavailable`] once the attempts are
//! spent. Replica-set lookups are single shot.

pub mod argocd;
pub mod error;
pub mod kubectl;
pub mod retry;
pub mod runner;

pub use argocd::{parse_application_status, ArgoCdTarget, StatusFetcher};
pub use error::{ProbeError, ProbeResult, Unavailable};
pub use kubectl::{parse_restart_counts, KubeTarget, Kubectl, POD_TEMPLATE_HASH_LABEL};
pub use retry::RetryPolicy;
pub use runner::{CommandRunner, ProcessRunner};
#[cfg(any(test, feature = "test-util"))]
pub use runner::{Scripted, ScriptedRunner};
