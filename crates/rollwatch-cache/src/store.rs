//! Verdict persistence.

use std::time::Duration;

use tracing::info;

use rollwatch_core::Verdict;

use crate::backend::CacheBackend;
use crate::error::{CacheError, CacheResult};

/// Default lifetime of a stored verdict.
pub const VERDICT_TTL: Duration = Duration::from_secs(3600);

/// Cache key for a build's verdict on a service: `{build_id}-{service}`.
pub fn cache_key(build_id: &str, service: &str) -> String {
    format!("{build_id}-{service}")
}

/// Writes rollout verdicts to the cache with a fixed expiry.
#[derive(Debug)]
pub struct VerdictStore<B> {
    backend: B,
    ttl: Duration,
}

impl<B: CacheBackend> VerdictStore<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Store `verdict` for the build and set its expiry.
    ///
    /// Not retried. Writing the same key again replaces the value and
    /// restarts the expiry.
    pub async fn persist(
        &mut self,
        service: &str,
        build_id: &str,
        verdict: Verdict,
    ) -> CacheResult<()> {
        let key = cache_key(build_id, service);
        info!(%key, value = verdict.as_cache_value(), ttl_secs = self.ttl.as_secs(), "setting cache key");
        self.backend.set(&key, verdict.as_cache_value()).await?;
        self.backend.expire(&key, self.ttl).await
    }

    /// Read back a stored verdict, if any.
    pub async fn fetch(&mut self, service: &str, build_id: &str) -> CacheResult<Option<Verdict>> {
        let key = cache_key(build_id, service);
        match self.backend.get(&key).await? {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| CacheError::InvalidVerdict { key, value }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
