//! Application status snapshots and the reference snapshots they are
//! classified against.
//!
//! A snapshot is the four-field tuple Argo CD reports for an application:
//! sync status, health status, operation phase and the synced revision.
//! The evaluator never inspects fields individually; it compares whole
//! snapshots against a [`ReferenceSnapshots`] set built from the revision
//! the current build is expected to deploy.

use std::fmt;

use serde::Deserialize;

/// Number of leading commit-hash characters kept for comparison.
pub const REVISION_LEN: usize = 7;

/// Sync status of an Argo CD application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SyncStatus {
    Synced,
    OutOfSync,
    #[serde(other)]
    Unknown,
}

/// Health status of an Argo CD application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Suspended,
    Progressing,
    Missing,
    #[serde(other)]
    Unknown,
}

/// Phase of the last Argo CD sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum OperationPhase {
    Succeeded,
    Running,
    Failed,
    Error,
    Terminating,
    #[serde(other)]
    Unknown,
}

/// A commit revision shortened to [`REVISION_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Build a revision from a full or already-short commit hash.
    pub fn short(hash: &str) -> Self {
        Self(hash.trim().chars().take(REVISION_LEN).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time status of an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusSnapshot {
    pub sync: SyncStatus,
    pub health: HealthStatus,
    pub phase: OperationPhase,
    pub revision: Revision,
}

impl StatusSnapshot {
    pub fn new(
        sync: SyncStatus,
        health: HealthStatus,
        phase: OperationPhase,
        revision: Revision,
    ) -> Self {
        Self {
            sync,
            health,
            phase,
            revision,
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sync={:?} health={:?} phase={:?} revision={}",
            self.sync, self.health, self.phase, self.revision
        )
    }
}

/// What a snapshot means for the rollout, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotClass {
    /// The expected revision is already deployed and healthy.
    Skip,
    /// The sync of the expected revision failed.
    Failed,
    /// The expected revision is paused mid-rollout, ready for inspection.
    Progressing,
}

/// The five snapshots a rollout is recognised by, all pinned to the
/// expected revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSnapshots {
    pub skip_succeeded: StatusSnapshot,
    pub skip_running: StatusSnapshot,
    pub failed_degraded: StatusSnapshot,
    pub progress_out_of_sync: StatusSnapshot,
    pub progress_synced: StatusSnapshot,
}

impl ReferenceSnapshots {
    pub fn new(expected: Revision) -> Self {
        use HealthStatus::*;
        use OperationPhase::*;
        use SyncStatus::*;

        let at = |sync, health, phase| StatusSnapshot::new(sync, health, phase, expected.clone());
        Self {
            skip_succeeded: at(Synced, Healthy, Succeeded),
            skip_running: at(Synced, Healthy, Running),
            failed_degraded: at(Synced, Degraded, Failed),
            progress_out_of_sync: at(OutOfSync, Suspended, Running),
            progress_synced: at(Synced, Suspended, Running),
        }
    }

    pub fn expected_revision(&self) -> &Revision {
        &self.skip_succeeded.revision
    }

    /// Classify a snapshot. `None` means "not a recognised state yet".
    pub fn classify(&self, snapshot: &StatusSnapshot) -> Option<SnapshotClass> {
        if *snapshot == self.skip_succeeded || *snapshot == self.skip_running {
            Some(SnapshotClass::Skip)
        } else if *snapshot == self.failed_degraded {
            Some(SnapshotClass::Failed)
        } else if *snapshot == self.progress_out_of_sync || *snapshot == self.progress_synced {
            Some(SnapshotClass::Progressing)
        } else {
            None
        }
    }
}
