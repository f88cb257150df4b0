//! Running the orchestrator CLIs.
//!
//! Queries go through [`CommandRunner`] so the fetchers can be driven by
//! scripted output in tests (`ScriptedRunner`, behind the `test-util`
//! feature) instead of real `argocd` / `kubectl` binaries.

#[cfg(any(test, feature = "test-util"))]
use std::collections::{HashMap, VecDeque};
use std::future::Future;
#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};

/// Runs an external program and returns its standard output.
///
/// `query` is a fixed label for logs. Arguments may carry credentials or
/// cluster names and are never logged.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        query: &'static str,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = ProbeResult<String>> + Send;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, query: &'static str, program: &str, args: &[String]) -> ProbeResult<String> {
        debug!(program, query, "running query");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::NonZeroExit {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A canned response for [`ScriptedRunner`].
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Exit 0 with this stdout.
    Stdout(String),
    /// Exit with this status and stderr.
    Exit(i32, String),
}

/// Replays canned responses per program, recording every invocation.
///
/// Responses for a program are consumed in order; the last one repeats
/// once the queue is down to a single entry. A program with no script
/// fails to spawn.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `program`.
    pub fn push(&self, program: &str, response: Scripted) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(program.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn push_stdout(&self, program: &str, stdout: impl Into<String>) -> &Self {
        self.push(program, Scripted::Stdout(stdout.into()))
    }

    /// Every invocation so far as `(program, args)`.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of invocations of `program`.
    pub fn call_count(&self, program: &str) -> usize {
        self.calls().iter().filter(|(p, _)| p == program).count()
    }

    fn next(&self, program: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let queue = scripts.get_mut(program)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _query: &'static str, program: &str, args: &[String]) -> ProbeResult<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((program.to_string(), args.to_vec()));

        match self.next(program) {
            Some(Scripted::Stdout(stdout)) => Ok(stdout),
            Some(Scripted::Exit(code, stderr)) => Err(ProbeError::NonZeroExit {
                program: program.to_string(),
                code: Some(code),
                stderr,
            }),
            None => Err(ProbeError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no script"),
            }),
        }
    }
}
