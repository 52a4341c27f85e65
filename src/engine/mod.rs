// src/engine/mod.rs

//! Batch orchestration.
//!
//! - [`scheduler`]: runs a list of scripts serially or with a bounded pool,
//!   fanning all output into one tagged stream.
//! - [`workspace`]: builds that list from workspaces and a script name.
//! - [`summary`]: the aggregate result of a batch.

pub mod scheduler;
pub mod summary;
pub mod workspace;

pub use scheduler::{
    ParallelOption, RunScriptsOptions, ScheduledScript, ScriptsCanceller, ScriptsHandle,
    SummaryFuture, TaggedChunk, TaggedStream, run_scripts,
};
pub use summary::RunSummary;
pub use workspace::{
    WorkspaceRun, WorkspaceScriptOptions, plan_workspace_runs, run_script_across_workspaces,
};
