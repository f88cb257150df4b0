//! rollwatch-core — shared types for rollout checks.
//!
//! - **`snapshot`** — Argo CD status snapshots and the reference set they
//!   are classified against
//! - **`verdict`** — the ternary verdict and container restart map
//! - **`settings`** — environment-derived run identity and TOML tuning

pub mod error;
pub mod settings;
pub mod snapshot;
pub mod verdict;

pub use error::{ConfigError, ConfigResult};
pub use settings::{CacheConfig, PollingConfig, RetryConfig, RunSettings, ToolsConfig, Tuning};
pub use snapshot::{
    HealthStatus, OperationPhase, ReferenceSnapshots, Revision, SnapshotClass, StatusSnapshot,
    SyncStatus,
};
pub use verdict::{RestartMap, Verdict};
