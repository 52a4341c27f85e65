// src/exec/process.rs

//! Running one script as a child process.

use std::collections::BTreeMap;
use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::command::ScriptCommand;
use crate::config::RunnerConfig;
use crate::errors::Result;
use crate::stream::merge_streams;
use crate::types::ShellMode;

use super::handle::{ChunkStream, RunControl, RunHandle, chunk_stream, exit_future};
use super::output::{OutputChunk, StreamName};
use super::result::{ExitResult, RunOutcome};
use super::shell::{prepare_launch, resolve_shell_mode};
use super::signal::{KillSignal, signal_name};
use super::temp::{TempArtifact, TempArtifactManager};

/// Env var forcing colored output in children whose stdout is a pipe.
pub const FORCE_COLOR_ENV: &str = "FORCE_COLOR";

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Caller options for [`run_script`].
#[derive(Debug, Clone)]
pub struct RunScriptOptions<M> {
    pub command: ScriptCommand,
    pub metadata: M,
    /// `lite`, `system` or `default`; `None` behaves like `default`.
    pub shell: Option<String>,
    /// Entries layered over the inherited process environment.
    pub env: BTreeMap<String, String>,
}

impl<M> RunScriptOptions<M> {
    pub fn new(command: ScriptCommand, metadata: M) -> Self {
        Self {
            command,
            metadata,
            shell: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A fully resolved run, as handed to a [`ScriptExecutor`](super::ScriptExecutor).
#[derive(Debug, Clone)]
pub struct ScriptRun<M> {
    pub metadata: M,
    pub command: ScriptCommand,
    pub env: BTreeMap<String, String>,
    pub shell: ShellMode,
}

/// Start one script.
///
/// The shell mode is resolved first; an invalid value is returned as a
/// configuration error before anything is written or spawned. Everything
/// after that is reported through the returned handle.
pub fn run_script<M>(
    options: RunScriptOptions<M>,
    config: &RunnerConfig,
    temp: &TempArtifactManager,
) -> Result<RunHandle<M>>
where
    M: Clone + Send + Sync + 'static,
{
    let shell = resolve_shell_mode(options.shell.as_deref(), config.shell_default.as_deref())?;
    Ok(spawn_run(
        ScriptRun {
            metadata: options.metadata,
            command: options.command,
            env: options.env,
            shell,
        },
        &config.runtime,
        temp,
    ))
}

/// Spawn a resolved run. Never fails: spawn problems come back as a
/// [`RunOutcome::SpawnFailed`] exit result.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_run<M>(run: ScriptRun<M>, runtime: &str, temp: &TempArtifactManager) -> RunHandle<M>
where
    M: Clone + Send + Sync + 'static,
{
    let started_at = Utc::now();
    let ScriptRun {
        metadata,
        command,
        env,
        shell,
    } = run;

    let launch = match prepare_launch(&command.command, shell, runtime, temp) {
        Ok(launch) => launch,
        Err(e) => {
            warn!(cmd = %command.command, error = %e, "failed to write script launcher");
            return spawn_failed(format!("writing launcher file: {e}"), started_at, metadata);
        }
    };

    let mut cmd = Command::new(launch.program());
    cmd.args(launch.args())
        .envs(&env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !env.contains_key(FORCE_COLOR_ENV) {
        cmd.env(FORCE_COLOR_ENV, "1");
    }
    if !command.working_directory.as_os_str().is_empty() {
        cmd.current_dir(&command.working_directory);
    }
    // Own process group, so a kill reaches whatever the shell started.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(
                cmd = %command.command,
                cwd = %command.working_directory.display(),
                error = %e,
                "failed to spawn script process"
            );
            launch.artifact.cleanup();
            let message = format!("spawning {:?}: {e}", launch.program());
            return spawn_failed(message, started_at, metadata);
        }
    };

    let pid = child.id();
    info!(pid, %shell, cmd = %command.command, "started script process");

    let stdout = pump(child.stdout.take(), StreamName::Stdout);
    let stderr = pump(child.stderr.take(), StreamName::Stderr);
    let output = merge_streams([stdout, stderr]).boxed();

    let launcher_path = launch.artifact.path().to_path_buf();
    let (control, kill_rx) = RunControl::channel();
    let (exit_tx, exit_rx) = oneshot::channel();

    tokio::spawn(supervise(
        child,
        kill_rx,
        launch.artifact,
        exit_tx,
        metadata.clone(),
        started_at,
    ));

    RunHandle::new(output, exit_future(exit_rx, metadata, started_at), control)
        .with_launcher(launcher_path)
}

fn spawn_failed<M: Send + 'static>(
    message: String,
    started_at: DateTime<Utc>,
    metadata: M,
) -> RunHandle<M> {
    RunHandle::finished(ExitResult::new(
        RunOutcome::SpawnFailed { message },
        started_at,
        Utc::now(),
        metadata,
    ))
}

/// Drain a pipe on a background task so the child never blocks on a full
/// pipe, whether or not anyone reads the stream.
fn pump<R>(reader: Option<R>, stream: StreamName) -> ChunkStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    if let Some(mut reader) = reader {
        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            let mut forwarding = true;
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if forwarding && tx.send(OutputChunk::new(stream, &buf[..n])).is_err() {
                            // Nobody listens anymore; keep draining.
                            forwarding = false;
                        }
                    }
                    Err(e) => {
                        debug!(%stream, error = %e, "pipe read failed; closing stream");
                        break;
                    }
                }
            }
        });
    }

    chunk_stream(rx)
}

/// Wait for the child, delivering kill requests meanwhile. The launcher is
/// removed as soon as the process is gone, before the result is published.
async fn supervise<M>(
    mut child: Child,
    mut kill_rx: mpsc::UnboundedReceiver<KillSignal>,
    artifact: TempArtifact,
    exit_tx: oneshot::Sender<ExitResult<M>>,
    metadata: M,
    started_at: DateTime<Utc>,
) {
    let pid = child.id();

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(signal) = kill_rx.recv() => deliver_signal(&mut child, pid, signal),
        }
    };
    kill_rx.close();

    artifact.cleanup();

    let outcome = match status {
        Ok(status) => outcome_from_status(status),
        Err(e) => {
            warn!(pid, error = %e, "failed waiting for script process");
            RunOutcome::Exited { code: -1 }
        }
    };
    let result = ExitResult::new(outcome, started_at, Utc::now(), metadata);

    info!(
        pid,
        exit_code = result.exit_code,
        signal = result.signal.as_deref(),
        success = result.success,
        duration_ms = result.duration_ms,
        "script process exited"
    );

    if exit_tx.send(result).is_err() {
        debug!(pid, "exit result dropped; nobody awaited it");
    }
}

#[cfg(unix)]
fn deliver_signal(_child: &mut Child, pid: Option<u32>, signal: KillSignal) {
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid;

    let (Some(pid), Some(sig)) = (pid, signal.to_nix()) else {
        warn!(?pid, %signal, "cannot deliver signal to script process");
        return;
    };
    let pid = Pid::from_raw(pid as i32);

    debug!(%pid, %signal, "signalling script process group");
    if let Err(e) = killpg(pid, sig) {
        debug!(%pid, error = %e, "killpg failed; signalling process only");
        if let Err(e) = kill(pid, sig) {
            warn!(%pid, %signal, error = %e, "failed to signal script process");
        }
    }
}

#[cfg(not(unix))]
fn deliver_signal(child: &mut Child, pid: Option<u32>, signal: KillSignal) {
    debug!(?pid, %signal, "terminating script process");
    if let Err(e) = child.start_kill() {
        warn!(?pid, error = %e, "failed to terminate script process");
    }
}

fn outcome_from_status(status: ExitStatus) -> RunOutcome {
    if let Some(code) = status.code() {
        return RunOutcome::Exited { code };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signo) = status.signal() {
            return RunOutcome::Signaled {
                signal: signal_name(signo).unwrap_or_else(|| signo.to_string()),
                code: 128 + signo,
            };
        }
    }

    RunOutcome::Exited { code: -1 }
}
