// src/config/mod.rs

//! Runtime configuration for wsrun.
//!
//! There is no config file: the CLI layer (or an embedding application)
//! hands over already-validated values. The only inputs read here are
//! environment overrides:
//!
//! - `WSRUN_PARALLEL_MAX_DEFAULT`: what `"default"` parallelism resolves to.
//! - `WSRUN_SHELL_DEFAULT`: shell mode used when the caller doesn't pick one.
//! - `WSRUN_RUNTIME`: runtime executable used to run scripts (default `bun`).
//!
//! Responsibilities:
//! - Hold the resolved [`RunnerConfig`].
//! - Turn concurrency directives into caps (`parallel.rs`).

pub mod parallel;

pub use parallel::{
    ParallelSetting, available_processors, determine_parallel_max, determine_parallel_max_with,
};

pub const PARALLEL_MAX_DEFAULT_ENV: &str = "WSRUN_PARALLEL_MAX_DEFAULT";
pub const SHELL_DEFAULT_ENV: &str = "WSRUN_SHELL_DEFAULT";
pub const RUNTIME_ENV: &str = "WSRUN_RUNTIME";

/// Runtime executable used for `<runtime> run <script>` and lite shell mode.
pub const DEFAULT_RUNTIME: &str = "bun";

/// Defaults shared by every run started through a [`Runner`](crate::Runner).
///
/// Values are kept as raw strings; they're validated at resolution time so
/// that a bad override is reported as a configuration error right before
/// anything is spawned, never silently replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Executable for `<runtime> run ...`.
    pub runtime: String,
    /// Shell mode override (`lite`, `system`, `default`).
    pub shell_default: Option<String>,
    /// What the `"default"` parallel directive resolves to.
    pub parallel_default: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            shell_default: None,
            parallel_default: None,
        }
    }
}

impl RunnerConfig {
    /// Read the `WSRUN_*` overrides from the process environment.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            runtime: non_empty(RUNTIME_ENV).unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            shell_default: non_empty(SHELL_DEFAULT_ENV),
            parallel_default: non_empty(PARALLEL_MAX_DEFAULT_ENV),
        }
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn with_shell_default(mut self, mode: impl Into<String>) -> Self {
        self.shell_default = Some(mode.into());
        self
    }

    pub fn with_parallel_default(mut self, value: impl Into<String>) -> Self {
        self.parallel_default = Some(value.into());
        self
    }
}
