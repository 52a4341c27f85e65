// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running script commands, using
//! `tokio::process::Command`, and handing their output and exit status back
//! to the caller.
//!
//! - [`shell`] picks lite vs. system shell and writes the launcher file.
//! - [`temp`] owns the temp directory those launchers live in.
//! - [`process`] spawns and supervises one child process.
//! - [`handle`] is what callers get back: output stream, exit future, kill.
//! - [`backend`] provides the `ScriptExecutor` trait and the production
//!   `ProcessExecutor`, which tests can replace with a fake.

pub mod backend;
pub mod handle;
pub mod output;
pub mod process;
pub mod result;
pub mod shell;
pub mod signal;
pub mod temp;

pub use backend::{ProcessExecutor, ScriptExecutor};
pub use handle::{ChunkStream, ExitFuture, RunControl, RunHandle, chunk_stream, exit_future};
pub use output::{DecodeOptions, OutputChunk, StreamName, strip_ansi};
pub use process::{FORCE_COLOR_ENV, RunScriptOptions, ScriptRun, run_script, spawn_run};
pub use result::{ExitResult, RunOutcome, SPAWN_FAILURE_EXIT_CODE};
pub use shell::{ShellLaunch, prepare_launch, resolve_shell_mode, resolve_shell_mode_from_env};
pub use signal::{KillSignal, TerminationSignals, signal_name};
pub use temp::{TempArtifact, TempArtifactManager};
