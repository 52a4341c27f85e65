// src/runner.rs

//! `Runner`: the library entry point.
//!
//! A runner bundles the resolved [`RunnerConfig`] with one
//! [`TempArtifactManager`] so every run it starts shares the same temp
//! directory and cleanup.

use std::sync::Arc;

use crate::config::RunnerConfig;
use crate::engine::{
    RunScriptsOptions, ScriptsHandle, WorkspaceRun, WorkspaceScriptOptions,
    run_script_across_workspaces, run_scripts,
};
use crate::errors::Result;
use crate::exec::{ProcessExecutor, RunHandle, RunScriptOptions, TempArtifactManager, run_script};

#[derive(Debug, Clone)]
pub struct Runner {
    config: RunnerConfig,
    executor: Arc<ProcessExecutor>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_temp_manager(config, TempArtifactManager::new())
    }

    /// Runner configured from the `WSRUN_*` environment overrides.
    pub fn from_env() -> Self {
        Self::new(RunnerConfig::from_env())
    }

    pub fn with_temp_manager(config: RunnerConfig, temp: TempArtifactManager) -> Self {
        let executor = Arc::new(ProcessExecutor::new(temp, config.runtime.clone()));
        Self { config, executor }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn temp(&self) -> &TempArtifactManager {
        self.executor.temp()
    }

    pub fn run_script<M>(&self, options: RunScriptOptions<M>) -> Result<RunHandle<M>>
    where
        M: Clone + Send + Sync + 'static,
    {
        run_script(options, &self.config, self.temp())
    }

    pub fn run_scripts<M>(&self, options: RunScriptsOptions<M>) -> Result<ScriptsHandle<M>>
    where
        M: Clone + Send + Sync + 'static,
    {
        run_scripts(options, &self.config, Arc::clone(&self.executor))
    }

    pub fn run_script_across_workspaces(
        &self,
        options: WorkspaceScriptOptions,
    ) -> Result<ScriptsHandle<WorkspaceRun>> {
        run_script_across_workspaces(options, &self.config, Arc::clone(&self.executor))
    }
}
