//! Run settings.
//!
//! Two layers:
//! - [`RunSettings`]: identity of the rollout being checked, read from the
//!   environment the CI job exports. Every variable is required.
//! - [`Tuning`]: timings, retry bounds and endpoints, optionally read from a
//!   `rollwatch.toml` file. Every field has a default.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::snapshot::Revision;

pub const ENV_NAMESPACE: &str = "NAMESPACE";
pub const ENV_KUBECONFIG: &str = "K8S_KUBECONFIG";
pub const ENV_BUILD_NUMBER: &str = "BUILD_NUMBER";
pub const ENV_EXPECTED_REVISION: &str = "COMMIT_HASH_GITOPS";
pub const ENV_ARGOCD_TOKEN: &str = "ARGOCD_KEY";
pub const ENV_ARGOCD_APP: &str = "ARGOCD_APP_PROJECT_NAME";
pub const ENV_ARGOCD_SERVER: &str = "ARGOCD_SERVER";

/// Identity of a single rollout check.
#[derive(Clone)]
pub struct RunSettings {
    /// Rollout resource name; also the second half of the cache key.
    pub service: String,
    pub namespace: String,
    pub kubeconfig: PathBuf,
    /// CI build number; the first half of the cache key.
    pub build_id: String,
    pub expected_revision: Revision,
    pub argocd_token: String,
    pub argocd_app: String,
    pub argocd_server: String,
}

impl RunSettings {
    /// Load settings for `service` from the process environment.
    pub fn from_env(service: &str) -> ConfigResult<Self> {
        Self::from_lookup(service, |key| std::env::var(key).ok())
    }

    /// Load settings using an arbitrary variable lookup.
    pub fn from_lookup<F>(service: &str, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| -> ConfigResult<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };

        if service.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "service",
                reason: "service name must not be empty".to_string(),
            });
        }

        Ok(Self {
            service: service.trim().to_string(),
            namespace: require(ENV_NAMESPACE)?,
            kubeconfig: PathBuf::from(require(ENV_KUBECONFIG)?),
            build_id: require(ENV_BUILD_NUMBER)?,
            expected_revision: Revision::short(&require(ENV_EXPECTED_REVISION)?),
            argocd_token: require(ENV_ARGOCD_TOKEN)?,
            argocd_app: require(ENV_ARGOCD_APP)?,
            argocd_server: require(ENV_ARGOCD_SERVER)?,
        })
    }
}

impl fmt::Debug for RunSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSettings")
            .field("service", &self.service)
            .field("namespace", &self.namespace)
            .field("kubeconfig", &self.kubeconfig)
            .field("build_id", &self.build_id)
            .field("expected_revision", &self.expected_revision)
            .field("argocd_token", &"<redacted>")
            .field("argocd_app", &self.argocd_app)
            .field("argocd_server", &self.argocd_server)
            .finish()
    }
}

/// Tunable timings and endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between status polls.
    pub interval_secs: u64,
    /// Give up polling after this many seconds. Unset polls forever.
    pub timeout_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per query, including the first.
    pub max_attempts: u32,
    /// Seconds to wait between attempts.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `host:port` of the Redis server.
    pub address: String,
    pub database: u32,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            address: "redis:6379".to_string(),
            database: 0,
            ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub argocd: String,
    pub kubectl: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            argocd: "argocd".to_string(),
            kubectl: "kubectl".to_string(),
        }
    }
}

impl Tuning {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let tuning: Tuning = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "polling.interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.ttl_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.cache.address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "cache.address",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.polling.timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry.delay_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (ENV_NAMESPACE, "payments".to_string()),
            (ENV_KUBECONFIG, "/etc/kube/config".to_string()),
            (ENV_BUILD_NUMBER, "482".to_string()),
            (ENV_EXPECTED_REVISION, "a1b2c3d4e5f6".to_string()),
            (ENV_ARGOCD_TOKEN, "secret-token".to_string()),
            (ENV_ARGOCD_APP, "payments-app".to_string()),
            (ENV_ARGOCD_SERVER, "argocd.internal:443".to_string()),
        ])
    }

    #[test]
    fn loads_all_variables() {
        let env = full_env();
        let settings =
            RunSettings::from_lookup("checkout", |k| env.get(k).cloned()).unwrap();
        assert_eq!(settings.service, "checkout");
        assert_eq!(settings.build_id, "482");
        assert_eq!(settings.expected_revision.as_str(), "a1b2c3d");
        assert_eq!(settings.kubeconfig, PathBuf::from("/etc/kube/config"));
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let mut env = full_env();
        env.remove(ENV_ARGOCD_SERVER);
        let err = RunSettings::from_lookup("checkout", |k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_ARGOCD_SERVER)));
    }

    #[test]
    fn blank_variable_counts_as_missing() {
        let mut env = full_env();
        env.insert(ENV_BUILD_NUMBER, "  ".to_string());
        let err = RunSettings::from_lookup("checkout", |k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_BUILD_NUMBER)));
    }

    #[test]
    fn debug_redacts_token() {
        let env = full_env();
        let settings =
            RunSettings::from_lookup("checkout", |k| env.get(k).cloned()).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn tuning_defaults() {
        let tuning = Tuning::default();
        assert_eq!(tuning.poll_interval(), Duration::from_secs(5));
        assert_eq!(tuning.poll_timeout(), None);
        assert_eq!(tuning.retry.max_attempts, 4);
        assert_eq!(tuning.retry_delay(), Duration::from_secs(2));
        assert_eq!(tuning.cache.address, "redis:6379");
        assert_eq!(tuning.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn tuning_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollwatch.toml");
        std::fs::write(
            &path,
            "[polling]\ntimeout_secs = 900\n\n[cache]\naddress = \"cache.local:6380\"\n",
        )
        .unwrap();

        let tuning = Tuning::from_file(&path).unwrap();
        assert_eq!(tuning.poll_timeout(), Some(Duration::from_secs(900)));
        assert_eq!(tuning.poll_interval(), Duration::from_secs(5));
        assert_eq!(tuning.cache.address, "cache.local:6380");
        assert_eq!(tuning.cache.ttl_secs, 3600);
        assert_eq!(tuning.tools.kubectl, "kubectl");
    }

    #[test]
    fn tuning_rejects_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollwatch.toml");
        std::fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();

        let err = Tuning::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "retry.max_attempts", .. }));
    }

    #[test]
    fn tuning_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollwatch.toml");
        std::fs::write(&path, "[polling]\ninterval_secs = 0\n").unwrap();

        let err = Tuning::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "polling.interval_secs", .. }));

        let mut tuning = Tuning::default();
        tuning.polling.interval_secs = 0;
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn tuning_missing_file() {
        let err = Tuning::from_file(Path::new("/nonexistent/rollwatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
