//! Rollout verdicts and the container restart map they are derived from.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Final outcome of a rollout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Nothing new was deployed.
    Skip,
    Success,
    Failure,
}

impl Verdict {
    /// Cache representation consumed by the build pipeline.
    pub fn as_cache_value(self) -> &'static str {
        match self {
            Verdict::Skip => "Skip",
            Verdict::Success => "True",
            Verdict::Failure => "False",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cache_value())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Skip" => Ok(Verdict::Skip),
            "True" => Ok(Verdict::Success),
            "False" => Ok(Verdict::Failure),
            other => Err(format!("unrecognised verdict value: {other:?}")),
        }
    }
}

/// Restart counts per container name for one replica-set.
///
/// Built fresh for every evaluation. Containers are keyed by name only, so
/// two pods running a container of the same name collapse into one entry
/// and the pod recorded last wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartMap {
    counts: BTreeMap<String, u32>,
}

impl RestartMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a container's restart count, replacing any earlier entry.
    pub fn record(&mut self, container: impl Into<String>, restarts: u32) {
        self.counts.insert(container.into(), restarts);
    }

    pub fn get(&self, container: &str) -> Option<u32> {
        self.counts.get(container).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(name, n)| (name.as_str(), *n))
    }

    /// Containers that restarted at least once.
    pub fn restarted(&self) -> impl Iterator<Item = (&str, u32)> {
        self.iter().filter(|(_, n)| *n > 0)
    }

    /// `Success` iff at least one container was observed and none restarted.
    pub fn verdict(&self) -> Verdict {
        if !self.is_empty() && self.counts.values().all(|n| *n == 0) {
            Verdict::Success
        } else {
            Verdict::Failure
        }
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for RestartMap {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut map = RestartMap::new();
        for (name, restarts) in iter {
            map.record(name, restarts);
        }
        map
    }
}
