// src/engine/workspace.rs

//! Running one script across several workspaces.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::command::{
    ScriptCommandRequest, Workspace, create_inline_command, create_script_command, script_env_vars,
};
use crate::config::RunnerConfig;
use crate::errors::{Result, WsrunError};
use crate::exec::ScriptExecutor;
use crate::types::ScriptCommandMethod;

use super::scheduler::{
    ParallelOption, RunScriptsOptions, ScheduledScript, ScriptsHandle, run_scripts,
};

/// Metadata attached to each run started by [`run_script_across_workspaces`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceRun {
    pub workspace: Workspace,
    pub script: String,
}

/// Caller options for [`run_script_across_workspaces`].
#[derive(Debug, Clone, Default)]
pub struct WorkspaceScriptOptions {
    pub workspaces: Vec<Workspace>,
    /// Script name, or the script body itself when `inline` is set.
    pub script: String,
    pub args: String,
    pub method: ScriptCommandMethod,
    pub root: PathBuf,
    /// Run `script` as a shell snippet in every workspace instead of as a
    /// declared package script.
    pub inline: bool,
    /// Name exposed to inline scripts as `<scriptName>`/`WSRUN_SCRIPT_NAME`.
    pub inline_name: Option<String>,
    pub parallel: ParallelOption,
    pub env: BTreeMap<String, String>,
    pub shell: Option<String>,
}

impl WorkspaceScriptOptions {
    pub fn new(script: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_workspaces(mut self, workspaces: impl IntoIterator<Item = Workspace>) -> Self {
        self.workspaces.extend(workspaces);
        self
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    pub fn with_method(mut self, method: ScriptCommandMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_inline(mut self, name: Option<String>) -> Self {
        self.inline = true;
        self.inline_name = name;
        self
    }

    pub fn with_parallel(mut self, parallel: impl Into<ParallelOption>) -> Self {
        self.parallel = parallel.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

/// Build one scheduled run per matching workspace, in the given order.
///
/// Declared scripts only run where a workspace lists them; inline scripts
/// run in every workspace. Fails with [`WsrunError::ScriptNotFound`] when
/// nothing matches.
pub fn plan_workspace_runs(
    options: &WorkspaceScriptOptions,
    runtime: &str,
) -> Result<Vec<ScheduledScript<WorkspaceRun>>> {
    let script_name = match (options.inline, options.inline_name.as_deref()) {
        (true, Some(name)) => name,
        (true, None) => "(inline)",
        (false, _) => options.script.as_str(),
    };

    let scheduled: Vec<_> = options
        .workspaces
        .iter()
        .filter(|ws| {
            let runs = options.inline || ws.has_script(&options.script);
            if !runs {
                debug!(
                    workspace = %ws.name,
                    script = %options.script,
                    "workspace does not declare script"
                );
            }
            runs
        })
        .map(|ws| {
            let metadata = WorkspaceRun {
                workspace: ws.clone(),
                script: script_name.to_string(),
            };

            if options.inline {
                let command = create_inline_command(
                    ws,
                    &options.script,
                    script_name,
                    &options.args,
                    &options.root,
                );
                let mut scheduled = ScheduledScript::new(metadata, command);
                scheduled.env = script_env_vars(ws, script_name, &options.root);
                scheduled
            } else {
                let command = create_script_command(ScriptCommandRequest {
                    workspace: ws,
                    script: &options.script,
                    args: &options.args,
                    method: options.method,
                    root: &options.root,
                    runtime,
                });
                ScheduledScript::new(metadata, command)
            }
        })
        .collect();

    if scheduled.is_empty() {
        return Err(WsrunError::ScriptNotFound {
            script: options.script.clone(),
        });
    }
    Ok(scheduled)
}

/// Run a script in every workspace that declares it.
pub fn run_script_across_workspaces<E>(
    options: WorkspaceScriptOptions,
    config: &RunnerConfig,
    executor: Arc<E>,
) -> Result<ScriptsHandle<WorkspaceRun>>
where
    E: ScriptExecutor<WorkspaceRun> + ?Sized,
{
    let scripts = plan_workspace_runs(&options, &config.runtime)?;
    info!(
        script = %options.script,
        workspaces = scripts.len(),
        inline = options.inline,
        "running script across workspaces"
    );

    let mut batch = RunScriptsOptions::new(scripts).with_parallel(options.parallel);
    batch.env = options.env;
    batch.shell = options.shell;
    run_scripts(batch, config, executor)
}
