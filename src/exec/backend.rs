// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The scheduler talks to a `ScriptExecutor` instead of spawning processes
//! itself. Production code uses [`ProcessExecutor`]; tests can provide an
//! implementation that fabricates output and exit results without touching
//! the OS (see the `wsrun-test-utils` crate).

use super::handle::RunHandle;
use super::process::{ScriptRun, spawn_run};
use super::temp::TempArtifactManager;

/// Trait abstracting how a resolved run is started.
///
/// `start` must return promptly; the run itself proceeds in the background
/// and reports through the returned handle. It must never fail: problems
/// starting the run are reported as a failed exit result.
pub trait ScriptExecutor<M>: Send + Sync + 'static {
    fn start(&self, run: ScriptRun<M>) -> RunHandle<M>;
}

/// Real executor: one OS process per run, launched from a temp file.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    temp: TempArtifactManager,
    runtime: String,
}

impl ProcessExecutor {
    pub fn new(temp: TempArtifactManager, runtime: impl Into<String>) -> Self {
        Self {
            temp,
            runtime: runtime.into(),
        }
    }

    pub fn temp(&self) -> &TempArtifactManager {
        &self.temp
    }
}

impl<M> ScriptExecutor<M> for ProcessExecutor
where
    M: Clone + Send + Sync + 'static,
{
    fn start(&self, run: ScriptRun<M>) -> RunHandle<M> {
        spawn_run(run, &self.runtime, &self.temp)
    }
}
