// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod runner;
pub mod stream;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cli::{BatchArgs, CliArgs, CliCommand, ExecArgs, RunArgs};
use crate::command::ScriptCommand;
use crate::engine::{
    RunScriptsOptions, ScheduledScript, ScriptsCanceller, ScriptsHandle, WorkspaceRun,
    WorkspaceScriptOptions,
};
use crate::exec::{RunOutcome, StreamName, TempArtifactManager, TerminationSignals};

pub use crate::command::{ScriptCommandRequest, Workspace, create_script_command};
pub use crate::config::{ParallelSetting, RunnerConfig, determine_parallel_max};
pub use crate::engine::{RunSummary, run_script_across_workspaces, run_scripts};
pub use crate::errors::{Result as WsrunResult, WsrunError};
pub use crate::exec::{ExitResult, OutputChunk, RunHandle, RunScriptOptions, run_script};
pub use crate::runner::Runner;
pub use crate::stream::merge_streams;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// Temp artifacts are purged before returning: `main` leaves through
/// `std::process::exit`, which skips destructors.
pub async fn run(args: CliArgs) -> Result<i32> {
    let runner = Runner::from_env();
    debug!(config = ?runner.config(), "runner configured");

    let signals = TerminationSignals::listen().context("installing signal handlers")?;
    let code = match args.command {
        CliCommand::Run(run_args) => run_workspaces(&runner, run_args, signals).await,
        CliCommand::Exec(exec_args) => run_commands(&runner, exec_args, signals).await,
    };
    runner.temp().purge();
    code
}

async fn run_workspaces(
    runner: &Runner,
    args: RunArgs,
    signals: TerminationSignals,
) -> Result<i32> {
    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("resolving current directory")?,
    };

    // Workspaces named on the command line are taken to declare the script.
    let workspaces: Vec<Workspace> = args
        .workspaces
        .into_iter()
        .map(|ws| {
            if args.inline {
                ws
            } else {
                ws.with_script(args.script.clone())
            }
        })
        .collect();

    let mut options = WorkspaceScriptOptions::new(args.script, root)
        .with_workspaces(workspaces)
        .with_args(args.args.join(" "))
        .with_method(args.method.into())
        .with_parallel(args.batch.parallel_option());
    if args.inline {
        options = options.with_inline(args.inline_name);
    }
    options.shell = args.batch.shell.clone();

    let handle = runner.run_script_across_workspaces(options)?;
    drive_batch(handle, &args.batch, runner.temp(), signals, |run: &WorkspaceRun| {
        run.workspace.name.clone()
    })
    .await
}

async fn run_commands(
    runner: &Runner,
    args: ExecArgs,
    signals: TerminationSignals,
) -> Result<i32> {
    let cwd = args.cwd.unwrap_or_else(PathBuf::new);
    let scripts = args
        .commands
        .iter()
        .map(|cmd| ScheduledScript::new(cmd.clone(), ScriptCommand::new(cmd.clone(), cwd.clone())))
        .collect();

    let mut options = RunScriptsOptions::new(scripts).with_parallel(args.batch.parallel_option());
    options.shell = args.batch.shell.clone();

    let handle = runner.run_scripts(options)?;
    drive_batch(handle, &args.batch, runner.temp(), signals, |cmd: &String| cmd.clone()).await
}

/// Print a batch's output as it arrives, then its summary.
async fn drive_batch<M, F>(
    handle: ScriptsHandle<M>,
    batch: &BatchArgs,
    temp: &TempArtifactManager,
    signals: TerminationSignals,
    label: F,
) -> Result<i32>
where
    M: Serialize + Clone + Send + Sync + 'static,
    F: Fn(&M) -> String,
{
    let ScriptsHandle {
        mut output,
        summary,
        canceller,
    } = handle;

    // Exit code of the signal that stopped the batch; 0 while none has.
    let stopped_by = Arc::new(AtomicI32::new(0));
    let forwarder = tokio::spawn(forward_signals(
        signals,
        canceller,
        temp.clone(),
        Arc::clone(&stopped_by),
    ));

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    while let Some(tagged) = output.next().await {
        let stream = tagged.chunk.stream();
        let bytes = if batch.prefix {
            let text = tagged.chunk.decode(Default::default());
            prefixed(&label(&tagged.metadata), &text).into_bytes()
        } else {
            tagged.chunk.into_raw()
        };
        let written = match stream {
            StreamName::Stdout => stdout.write_all(&bytes).await,
            StreamName::Stderr => stderr.write_all(&bytes).await,
        };
        if let Err(e) = written {
            debug!(error = %e, "failed to write script output");
        }
    }
    if let Err(e) = stdout.flush().await {
        debug!(error = %e, "failed to flush script output");
    }

    let summary = summary.await;
    forwarder.abort();
    let summary = summary?;

    eprintln!(
        "wsrun: {} run(s), {} succeeded, {} failed in {} ms",
        summary.total_count, summary.success_count, summary.failure_count, summary.duration_ms
    );
    for failed in summary.failures() {
        let reason = match &failed.outcome {
            RunOutcome::Exited { code } => format!("exited with code {code}"),
            RunOutcome::Signaled { signal, .. } => format!("killed by {signal}"),
            RunOutcome::SpawnFailed { message } => format!("failed to start: {message}"),
            RunOutcome::Cancelled => "cancelled".to_string(),
        };
        eprintln!("  {}: {reason}", label(&failed.metadata));
    }

    if let Some(path) = &batch.json_outfile {
        let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing summary to {}", path.display()))?;
        info!(path = %path.display(), "wrote run summary");
    }

    let signal_code = stopped_by.load(Ordering::SeqCst);
    Ok(if signal_code != 0 {
        signal_code
    } else if summary.all_success {
        0
    } else {
        1
    })
}

/// The first termination signal is forwarded to every running script and
/// stops the batch; a second one purges temp artifacts and exits at once.
async fn forward_signals(
    mut signals: TerminationSignals,
    canceller: ScriptsCanceller,
    temp: TempArtifactManager,
    stopped_by: Arc<AtomicI32>,
) {
    let signal = signals.recv().await;
    stopped_by.store(signal.exit_code(), Ordering::SeqCst);
    warn!(%signal, "stopping scripts (signal again to force exit)");
    canceller.cancel(signal);

    let signal = signals.recv().await;
    warn!(%signal, "received second signal; exiting");
    temp.purge();
    std::process::exit(signal.exit_code());
}

fn prefixed(label: &str, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + label.len() + 4);
    for line in text.split_inclusive('\n') {
        out.push('[');
        out.push_str(label);
        out.push_str("] ");
        out.push_str(line);
    }
    out
}
