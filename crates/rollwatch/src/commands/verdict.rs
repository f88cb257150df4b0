//! `rollwatch verdict`: read back a recorded verdict.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use rollwatch_cache::{cache_key, CacheBackend, RedisClient, VerdictStore};

use super::{load_tuning, Overrides};
use crate::exit::Outcome;

pub async fn verdict(
    service: &str,
    build: &str,
    config: Option<&Path>,
    overrides: &Overrides,
) -> anyhow::Result<Outcome> {
    let tuning = load_tuning(config, overrides)?;
    let client = RedisClient::open(&tuning.cache)
        .await
        .with_context(|| format!("connecting to redis at {}", tuning.cache.address))?;
    let mut store = VerdictStore::new(client, tuning.cache_ttl());
    lookup(&mut store, service, build).await
}

async fn lookup<B: CacheBackend>(
    store: &mut VerdictStore<B>,
    service: &str,
    build: &str,
) -> anyhow::Result<Outcome> {
    match store.fetch(service, build).await? {
        Some(verdict) => {
            println!("{verdict}");
            Ok(Outcome::Verdict)
        }
        None => {
            info!(key = %cache_key(build, service), "no verdict recorded");
            Ok(Outcome::Absent)
        }
    }
}

#[cfg(test)]
mod tests {
    use rollwatch_cache::{MemoryBackend, VERDICT_TTL};
    use rollwatch_core::Verdict;

    use super::*;

    #[tokio::test]
    async fn recorded_verdict_is_found() {
        let mut store = VerdictStore::new(MemoryBackend::new(), VERDICT_TTL);
        store.persist("checkout", "482", Verdict::Skip).await.unwrap();

        let outcome = lookup(&mut store, "checkout", "482").await.unwrap();
        assert_eq!(outcome, Outcome::Verdict);
    }

    #[tokio::test]
    async fn other_build_is_absent() {
        let mut store = VerdictStore::new(MemoryBackend::new(), VERDICT_TTL);
        store.persist("checkout", "482", Verdict::Failure).await.unwrap();

        let outcome = lookup(&mut store, "checkout", "483").await.unwrap();
        assert_eq!(outcome, Outcome::Absent);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn foreign_value_is_an_error() {
        let mut backend = MemoryBackend::new();
        backend.set("482-checkout", "maybe").await.unwrap();
        let mut store = VerdictStore::new(backend, VERDICT_TTL);

        let err = lookup(&mut store, "checkout", "482").await.unwrap_err();
        assert_eq!(Outcome::from_error(&err), Outcome::Cache);
    }
}
