//! `rollwatch check`: evaluate a rollout and record the verdict.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use rollwatch_cache::{cache_key, CacheBackend, LazyClient, VerdictStore};
use rollwatch_core::{RunSettings, Tuning};
use rollwatch_probe::{
    ArgoCdTarget, CommandRunner, KubeTarget, Kubectl, ProcessRunner, RetryPolicy, StatusFetcher,
};
use rollwatch_rollout::{ClusterObserver, PollSettings, RolloutEvaluator};

use super::{load_tuning, Overrides};
use crate::exit::Outcome;

pub async fn check(
    service: &str,
    config: Option<&Path>,
    overrides: &Overrides,
    dry_run: bool,
) -> anyhow::Result<Outcome> {
    let settings = RunSettings::from_env(service)?;
    let tuning = load_tuning(config, overrides)?;
    info!(
        service = %settings.service,
        build = %settings.build_id,
        namespace = %settings.namespace,
        revision = %settings.expected_revision,
        "starting rollout check"
    );

    let mut store = VerdictStore::new(LazyClient::new(tuning.cache.clone()), tuning.cache_ttl());
    check_with(
        Arc::new(ProcessRunner),
        &settings,
        &tuning,
        &mut store,
        dry_run,
        shutdown_on_ctrl_c(),
    )
    .await
}

/// Evaluate the rollout and, unless `dry_run`, write the verdict to `store`.
async fn check_with<R: CommandRunner, B: CacheBackend>(
    runner: Arc<R>,
    settings: &RunSettings,
    tuning: &Tuning,
    store: &mut VerdictStore<B>,
    dry_run: bool,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Outcome> {
    let mut evaluator = evaluator(runner, settings, tuning);

    if dry_run {
        let verdict = evaluator.evaluate(shutdown).await?;
        info!(
            key = %cache_key(&settings.build_id, &settings.service),
            value = verdict.as_cache_value(),
            "dry run, verdict not written"
        );
        return Ok(Outcome::Verdict);
    }

    evaluator.run(store, &settings.build_id, shutdown).await?;
    Ok(Outcome::Verdict)
}

/// Wire the CLI clients for one service into an evaluator.
fn evaluator<R: CommandRunner>(
    runner: Arc<R>,
    settings: &RunSettings,
    tuning: &Tuning,
) -> RolloutEvaluator<ClusterObserver<R>> {
    let retry = RetryPolicy::new(tuning.retry.max_attempts, tuning.retry_delay());
    let status = StatusFetcher::new(
        runner.clone(),
        ArgoCdTarget {
            binary: tuning.tools.argocd.clone(),
            app: settings.argocd_app.clone(),
            token: settings.argocd_token.clone(),
            server: settings.argocd_server.clone(),
        },
        retry,
    );
    let kubectl = Kubectl::new(
        runner,
        KubeTarget {
            binary: tuning.tools.kubectl.clone(),
            kubeconfig: settings.kubeconfig.clone(),
            namespace: settings.namespace.clone(),
        },
        retry,
    );

    RolloutEvaluator::new(
        &settings.service,
        ClusterObserver::new(status, kubectl),
        settings.expected_revision.clone(),
        PollSettings {
            interval: tuning.poll_interval(),
            timeout: tuning.poll_timeout(),
        },
    )
}

fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });
    shutdown_rx
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rollwatch_cache::{MemoryBackend, VERDICT_TTL};
    use rollwatch_core::Verdict;
    use rollwatch_probe::ScriptedRunner;
    use serde_json::json;

    use super::*;

    fn settings() -> RunSettings {
        let env = HashMap::from([
            ("NAMESPACE", "shop"),
            ("K8S_KUBECONFIG", "/etc/kube/ci"),
            ("BUILD_NUMBER", "482"),
            ("COMMIT_HASH_GITOPS", "a1b2c3d4e5f6"),
            ("ARGOCD_KEY", "argo-token"),
            ("ARGOCD_APP_PROJECT_NAME", "shop-apps"),
            ("ARGOCD_SERVER", "argocd.ci:443"),
        ]);
        RunSettings::from_lookup("checkout", |key| env.get(key).map(|v| v.to_string())).unwrap()
    }

    fn application(sync: &str, health: &str, phase: &str) -> String {
        json!({
            "status": {
                "sync": { "status": sync, "revision": "a1b2c3d4e5f6" },
                "health": { "status": health },
                "operationState": { "phase": phase }
            }
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn evaluator_uses_configured_tools_and_credentials() {
        let mut tuning = Tuning::default();
        tuning.tools.argocd = "/opt/bin/argocd".to_string();
        tuning.tools.kubectl = "/opt/bin/kubectl".to_string();

        let runner = Arc::new(ScriptedRunner::new());
        runner
            .push_stdout("/opt/bin/argocd", application("OutOfSync", "Progressing", "Running"))
            .push_stdout("/opt/bin/argocd", application("Synced", "Suspended", "Running"));
        runner
            .push_stdout(
                "/opt/bin/kubectl",
                json!({ "status": { "stableRS": "6f9c8d7b5", "currentPodHash": "7d4b9c6f8" } })
                    .to_string(),
            )
            .push_stdout(
                "/opt/bin/kubectl",
                json!({ "status": { "stableRS": "6f9c8d7b5", "currentPodHash": "7d4b9c6f8" } })
                    .to_string(),
            )
            .push_stdout(
                "/opt/bin/kubectl",
                json!({ "items": [ { "status": { "containerStatuses": [
                    { "name": "app", "restartCount": 0 }
                ] } } ] })
                .to_string(),
            );

        let settings = settings();
        let mut store = VerdictStore::new(MemoryBackend::new(), VERDICT_TTL);
        let verdict = evaluator(runner.clone(), &settings, &tuning)
            .run(&mut store, &settings.build_id, watch::channel(false).1)
            .await
            .unwrap();

        assert_eq!(verdict, Verdict::Success);
        assert_eq!(store.backend().value("482-checkout"), Some("True"));

        let calls = runner.calls();
        let (program, argocd_args) = &calls[0];
        assert_eq!(program, "/opt/bin/argocd");
        assert!(argocd_args.contains(&"shop-apps".to_string()));
        assert!(argocd_args.contains(&"argo-token".to_string()));
        assert!(argocd_args.contains(&"argocd.ci:443".to_string()));

        let (_, kubectl_args) = calls.iter().find(|(p, _)| p == "/opt/bin/kubectl").unwrap();
        assert!(kubectl_args.contains(&"--kubeconfig=/etc/kube/ci".to_string()));
        assert!(kubectl_args.contains(&"shop".to_string()));
    }

    fn paused_rollout(runner: &ScriptedRunner, restarts: u32) {
        runner
            .push_stdout("argocd", application("OutOfSync", "Progressing", "Running"))
            .push_stdout("argocd", application("OutOfSync", "Suspended", "Running"));
        let rollout =
            json!({ "status": { "stableRS": "6f9c8d7b5", "currentPodHash": "7d4b9c6f8" } })
                .to_string();
        runner
            .push_stdout("kubectl", rollout.clone())
            .push_stdout("kubectl", rollout)
            .push_stdout(
                "kubectl",
                json!({ "items": [ { "status": { "containerStatuses": [
                    { "name": "app", "restartCount": restarts }
                ] } } ] })
                .to_string(),
            );
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_writes_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        paused_rollout(&runner, 0);
        let mut store = VerdictStore::new(MemoryBackend::new(), VERDICT_TTL);

        let outcome = check_with(
            runner.clone(),
            &settings(),
            &Tuning::default(),
            &mut store,
            true,
            watch::channel(false).1,
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Verdict);
        assert!(store.backend().is_empty());
        assert_eq!(store.backend().writes(), 0);
        // The rollout was still fully evaluated.
        assert_eq!(runner.call_count("kubectl"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn check_writes_verdict() {
        let runner = Arc::new(ScriptedRunner::new());
        paused_rollout(&runner, 2);
        let mut store = VerdictStore::new(MemoryBackend::new(), VERDICT_TTL);

        let outcome = check_with(
            runner,
            &settings(),
            &Tuning::default(),
            &mut store,
            false,
            watch::channel(false).1,
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Verdict);
        assert_eq!(store.backend().writes(), 1);
        assert_eq!(store.backend().value("482-checkout"), Some("False"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_cache_fails_after_evaluation() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let runner = Arc::new(ScriptedRunner::new());
        paused_rollout(&runner, 0);
        let mut tuning = Tuning::default();
        tuning.cache.address = address;
        let mut store = VerdictStore::new(LazyClient::new(tuning.cache.clone()), VERDICT_TTL);

        let err = check_with(
            runner.clone(),
            &settings(),
            &tuning,
            &mut store,
            false,
            watch::channel(false).1,
        )
        .await
        .unwrap_err();

        assert_eq!(Outcome::from_error(&err), Outcome::Cache);
        // The cache was only contacted once the verdict was ready.
        assert_eq!(runner.call_count("kubectl"), 3);
        assert!(!store.backend().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_never_connects() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_stdout("argocd", application("Synced", "Healthy", "Succeeded"));
        let mut tuning = Tuning::default();
        tuning.cache.address = "127.0.0.1:1".to_string();
        let mut store = VerdictStore::new(LazyClient::new(tuning.cache.clone()), VERDICT_TTL);

        let outcome = check_with(
            runner,
            &settings(),
            &tuning,
            &mut store,
            true,
            watch::channel(false).1,
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Verdict);
        assert!(!store.backend().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_settings_follow_tuning() {
        let mut tuning = Tuning::default();
        tuning.polling.interval_secs = 10;
        tuning.polling.timeout_secs = Some(25);

        let runner = Arc::new(ScriptedRunner::new());
        runner.push_stdout("argocd", application("OutOfSync", "Progressing", "Running"));

        let mut evaluator = evaluator(runner.clone(), &settings(), &tuning);
        let err = evaluator.evaluate(watch::channel(false).1).await.unwrap_err();
        assert!(matches!(
            err,
            rollwatch_rollout::EvaluationError::DeadlineExceeded { polls: 3, .. }
        ));
        // Initial fetch plus polls at 10s and 20s.
        assert_eq!(runner.call_count("argocd"), 3);
    }
}
