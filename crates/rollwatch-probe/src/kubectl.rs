//! Argo Rollouts and pod queries through `kubectl`.
//!
//! Two kinds of query:
//! - the `rollouts.argoproj.io` resource, for the stable and new
//!   replica-set hashes (single shot, failures are fatal to the caller)
//! - the pods of one replica-set, for container restart counts (retried)

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use rollwatch_core::RestartMap;

use crate::error::{ProbeError, ProbeResult, Unavailable};
use crate::retry::RetryPolicy;
use crate::runner::CommandRunner;

/// Label Argo Rollouts puts on every pod of a replica-set.
pub const POD_TEMPLATE_HASH_LABEL: &str = "rollouts-pod-template-hash";

/// Cluster access for `kubectl`.
#[derive(Debug, Clone)]
pub struct KubeTarget {
    /// Path or name of the `kubectl` binary.
    pub binary: String,
    pub kubeconfig: PathBuf,
    pub namespace: String,
}

impl KubeTarget {
    fn get_args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec![
            format!("--kubeconfig={}", self.kubeconfig.display()),
            "-n".to_string(),
            self.namespace.clone(),
            "get".to_string(),
        ];
        args.extend(rest.iter().map(|s| s.to_string()));
        args.extend(["-o".to_string(), "json".to_string()]);
        args
    }
}

#[derive(Deserialize)]
struct RolloutDoc {
    status: RolloutStatus,
}

#[derive(Deserialize)]
struct RolloutStatus {
    #[serde(rename = "stableRS")]
    stable_rs: Option<String>,
    #[serde(rename = "currentPodHash")]
    current_pod_hash: Option<String>,
}

#[derive(Deserialize)]
struct PodList {
    items: Vec<Pod>,
}

#[derive(Deserialize)]
struct Pod {
    status: PodStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerStatus {
    name: String,
    restart_count: u32,
}

fn parse_rollout(json: &str) -> ProbeResult<RolloutStatus> {
    let doc: RolloutDoc =
        serde_json::from_str(json).map_err(|source| ProbeError::MalformedResponse {
            what: "rollout",
            source,
        })?;
    Ok(doc.status)
}

/// Decode `kubectl get pods -o json` output into restart counts.
///
/// A pod without `containerStatuses` (still scheduling) makes the whole
/// response malformed so the caller retries rather than judging a partial
/// set of containers.
pub fn parse_restart_counts(json: &str) -> ProbeResult<RestartMap> {
    let pods: PodList =
        serde_json::from_str(json).map_err(|source| ProbeError::MalformedResponse {
            what: "pod list",
            source,
        })?;
    Ok(pods
        .items
        .into_iter()
        .flat_map(|pod| pod.status.container_statuses)
        .map(|c| (c.name, c.restart_count))
        .collect())
}

/// Queries the container orchestrator for one namespace.
pub struct Kubectl<R> {
    runner: Arc<R>,
    target: KubeTarget,
    retry: RetryPolicy,
}

impl<R: CommandRunner> Kubectl<R> {
    pub fn new(runner: Arc<R>, target: KubeTarget, retry: RetryPolicy) -> Self {
        Self {
            runner,
            target,
            retry,
        }
    }

    async fn rollout_status(&self, service: &str) -> ProbeResult<RolloutStatus> {
        let args = self.target.get_args(&["rollouts.argoproj.io", service]);
        let stdout = self.runner.run("rollout", &self.target.binary, &args).await?;
        parse_rollout(&stdout)
    }

    /// Hash of the replica-set currently serving as stable.
    pub async fn stable_replica_set(&self, service: &str) -> ProbeResult<String> {
        self.rollout_status(service)
            .await?
            .stable_rs
            .ok_or(ProbeError::MissingField {
                what: "rollout",
                field: "status.stableRS",
            })
    }

    /// Hash of the replica-set being rolled out.
    pub async fn new_replica_set(&self, service: &str) -> ProbeResult<String> {
        self.rollout_status(service)
            .await?
            .current_pod_hash
            .ok_or(ProbeError::MissingField {
                what: "rollout",
                field: "status.currentPodHash",
            })
    }

    /// Restart counts for every container in the replica-set's pods.
    pub async fn restart_counts(&self, replica_set: &str) -> Result<RestartMap, Unavailable> {
        let selector = format!("{POD_TEMPLATE_HASH_LABEL}={replica_set}");
        let args = &self.target.get_args(&["pods", "-l", selector.as_str()]);
        self.retry
            .run("container statuses", move || async move {
                let stdout = self
                    .runner
                    .run("container statuses", &self.target.binary, args)
                    .await?;
                let restarts = parse_restart_counts(&stdout)?;
                debug!(%replica_set, containers = restarts.len(), "container statuses");
                Ok::<_, ProbeError>(restarts)
            })
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{pods_json, rollout_json};
    use super::*;
    use crate::runner::ScriptedRunner;

    fn kubectl(runner: Arc<ScriptedRunner>) -> Kubectl<ScriptedRunner> {
        Kubectl::new(
            runner,
            KubeTarget {
                binary: "kubectl".to_string(),
                kubeconfig: PathBuf::from("/etc/kube/config"),
                namespace: "payments".to_string(),
            },
            RetryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn resolves_replica_sets() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_stdout("kubectl", rollout_json("6f9c8d7b5", "7d4b9c6f8"));
        let kubectl = kubectl(runner.clone());

        assert_eq!(kubectl.stable_replica_set("checkout").await.unwrap(), "6f9c8d7b5");
        assert_eq!(kubectl.new_replica_set("checkout").await.unwrap(), "7d4b9c6f8");

        let calls = runner.calls();
        let (_, args) = &calls[0];
        assert_eq!(
            args,
            &vec![
                "--kubeconfig=/etc/kube/config",
                "-n",
                "payments",
                "get",
                "rollouts.argoproj.io",
                "checkout",
                "-o",
                "json"
            ]
        );
    }

    #[tokio::test]
    async fn missing_pod_hash_is_an_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_stdout("kubectl", r#"{"status":{"stableRS":"6f9c8d7b5"}}"#);
        let err = kubectl(runner).new_replica_set("checkout").await.unwrap_err();
        assert!(matches!(
            err,
            ProbeError::MissingField { field: "status.currentPodHash", .. }
        ));
    }

    #[tokio::test]
    async fn replica_set_query_is_single_shot() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push("kubectl", crate::runner::Scripted::Exit(1, "NotFound".to_string()));
        let err = kubectl(runner.clone()).stable_replica_set("checkout").await.unwrap_err();
        assert!(matches!(err, ProbeError::NonZeroExit { .. }));
        assert_eq!(runner.call_count("kubectl"), 1);
    }

    #[test]
    fn restart_counts_span_all_pods() {
        let json = pods_json(&[&[("app", 0), ("sidecar", 1)], &[("app", 0), ("sidecar", 0)]]);
        let restarts = parse_restart_counts(&json).unwrap();
        assert_eq!(restarts.len(), 2);
        // Same container name in a later pod replaces the earlier count.
        assert_eq!(restarts.get("sidecar"), Some(0));
    }

    #[test]
    fn pending_pod_is_malformed() {
        let json = r#"{"items":[{"status":{"phase":"Pending"}}]}"#;
        assert!(matches!(
            parse_restart_counts(json).unwrap_err(),
            ProbeError::MalformedResponse { what: "pod list", .. }
        ));
    }

    #[tokio::test]
    async fn restart_counts_select_by_template_hash() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_stdout("kubectl", pods_json(&[&[("app", 2)]]));
        let restarts = kubectl(runner.clone())
            .restart_counts("7d4b9c6f8")
            .await
            .unwrap();
        assert_eq!(restarts.get("app"), Some(2));

        let calls = runner.calls();
        let (_, args) = &calls[0];
        assert!(args.contains(&"rollouts-pod-template-hash=7d4b9c6f8".to_string()));
        assert!(args.contains(&"pods".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_counts_unavailable_after_retries() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_stdout("kubectl", "not json");
        let err = kubectl(runner.clone()).restart_counts("7d4b9c6f8").await.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(runner.call_count("kubectl"), 4);
    }
}
