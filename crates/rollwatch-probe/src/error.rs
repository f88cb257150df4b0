//! Orchestrator query error types.

use std::fmt;

use thiserror::Error;

/// Result type alias for a single orchestrator query.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors from a single query attempt.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("malformed {what} response: {source}")]
    MalformedResponse {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("{what} response is missing {field}")]
    MissingField {
        what: &'static str,
        field: &'static str,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// A retried query that never produced a usable response.
#[derive(Debug)]
pub struct Unavailable {
    pub query: &'static str,
    pub attempts: u32,
    pub last_error: ProbeError,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unavailable after {} attempts: {}",
            self.query, self.attempts, self.last_error
        )
    }
}

impl std::error::Error for Unavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}
