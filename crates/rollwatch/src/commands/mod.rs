pub mod check;
pub mod verdict;

use std::path::Path;

use rollwatch_core::{ConfigResult, Tuning};
use tracing::debug;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub timeout_secs: Option<u64>,
    pub redis: Option<String>,
}

/// Defaults, then the TOML file if given, then command-line overrides.
pub fn load_tuning(path: Option<&Path>, overrides: &Overrides) -> ConfigResult<Tuning> {
    let mut tuning = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            Tuning::from_file(path)?
        }
        None => Tuning::default(),
    };

    if let Some(secs) = overrides.timeout_secs {
        tuning.polling.timeout_secs = Some(secs);
    }
    if let Some(address) = &overrides.redis {
        tuning.cache.address = address.clone();
    }
    tuning.validate()?;
    Ok(tuning)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use rollwatch_core::ConfigError;

    use super::*;

    #[test]
    fn defaults_without_file() {
        let tuning = load_tuning(None, &Overrides::default()).unwrap();
        assert_eq!(tuning, Tuning::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollwatch.toml");
        fs::write(
            &path,
            "[polling]\ntimeout_secs = 600\n\n[cache]\naddress = \"redis.ci:6379\"\ndatabase = 3\n",
        )
        .unwrap();

        let from_file = load_tuning(Some(&path), &Overrides::default()).unwrap();
        assert_eq!(from_file.poll_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(from_file.cache.address, "redis.ci:6379");

        let overrides = Overrides {
            timeout_secs: Some(120),
            redis: Some("localhost:6380".to_string()),
        };
        let tuning = load_tuning(Some(&path), &overrides).unwrap();
        assert_eq!(tuning.poll_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(tuning.cache.address, "localhost:6380");
        assert_eq!(tuning.cache.database, 3);
    }

    #[test]
    fn empty_redis_flag_is_rejected() {
        let overrides = Overrides {
            timeout_secs: None,
            redis: Some(String::new()),
        };
        let err = load_tuning(None, &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tuning(Some(&dir.path().join("absent.toml")), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
