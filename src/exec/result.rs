// src/exec/result.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Exit code reported for runs whose process never started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// How a run ended.
///
/// Per-run failures are data: none of these variants is ever raised as an
/// error, so a failing run cannot abort its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunOutcome {
    /// The process exited on its own with this code.
    Exited { code: i32 },
    /// The process was terminated by a signal.
    Signaled { signal: String, code: i32 },
    /// The process could not be started (missing executable, bad working
    /// directory, launcher file not writable, ...).
    SpawnFailed { message: String },
    /// The batch was cancelled before this run was started.
    Cancelled,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Exited { code } | RunOutcome::Signaled { code, .. } => *code,
            RunOutcome::SpawnFailed { .. } | RunOutcome::Cancelled => SPAWN_FAILURE_EXIT_CODE,
        }
    }

    pub fn signal(&self) -> Option<&str> {
        match self {
            RunOutcome::Signaled { signal, .. } => Some(signal),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Exited { code: 0 })
    }
}

/// Final result of one run.
///
/// `exit_code`, `signal` and `success` mirror `outcome` for consumers that
/// only read the flat fields (e.g. the JSON results file).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResult<M> {
    pub exit_code: i32,
    pub signal: Option<String>,
    pub success: bool,
    pub outcome: RunOutcome,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub metadata: M,
}

impl<M> ExitResult<M> {
    pub fn new(
        outcome: RunOutcome,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        metadata: M,
    ) -> Self {
        Self {
            exit_code: outcome.exit_code(),
            signal: outcome.signal().map(str::to_string),
            success: outcome.is_success(),
            outcome,
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds().max(0),
            metadata,
        }
    }
}
