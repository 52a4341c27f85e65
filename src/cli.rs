// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::command::Workspace;
use crate::config::ParallelSetting;
use crate::engine::ParallelOption;
use crate::types::ScriptCommandMethod;

/// Command-line arguments for `wsrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wsrun",
    version,
    about = "Run package scripts across monorepo workspaces.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WSRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Run a script in each given workspace.
    Run(RunArgs),
    /// Run ad hoc shell commands, one run per command.
    Exec(ExecArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Script name (or the script body with `--inline`).
    pub script: String,

    /// Extra arguments appended to the script command (after `--`).
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Workspace as `name=path` or just `path` (named after its last
    /// component). Repeatable; runs happen in the given order.
    #[arg(
        short = 'w',
        long = "workspace",
        value_name = "NAME=PATH",
        required = true,
        value_parser = parse_workspace
    )]
    pub workspaces: Vec<Workspace>,

    /// Project root workspace paths are relative to. Default: current dir.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// How the workspace is targeted.
    #[arg(long, value_enum, default_value_t = MethodArg::Cd)]
    pub method: MethodArg,

    /// Treat SCRIPT as a shell snippet instead of a package script name.
    #[arg(long)]
    pub inline: bool,

    /// Script name exposed to inline scripts.
    #[arg(long, value_name = "NAME", requires = "inline")]
    pub inline_name: Option<String>,

    #[command(flatten)]
    pub batch: BatchArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
    /// Commands to run.
    #[arg(required = true)]
    pub commands: Vec<String>,

    /// Working directory for every command. Default: current dir.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    #[command(flatten)]
    pub batch: BatchArgs,
}

/// Options shared by every subcommand that starts a batch.
#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// Run in parallel, optionally capped: `--parallel=N|N%|auto|unbounded|default`.
    #[arg(
        long,
        value_name = "MAX",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "default"
    )]
    pub parallel: Option<String>,

    /// Shell mode: lite, system or default.
    #[arg(long, value_name = "MODE")]
    pub shell: Option<String>,

    /// Prefix each output chunk with the name of the run it came from.
    #[arg(long)]
    pub prefix: bool,

    /// Write the run summary as JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub json_outfile: Option<PathBuf>,
}

impl BatchArgs {
    pub fn parallel_option(&self) -> ParallelOption {
        match self.parallel.as_deref() {
            None => ParallelOption::Serial,
            Some(v) if v.trim().eq_ignore_ascii_case("default") => ParallelOption::Default,
            Some(v) => ParallelOption::Max(ParallelSetting::from(v)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Cd,
    Filter,
}

impl From<MethodArg> for ScriptCommandMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Cd => ScriptCommandMethod::Cd,
            MethodArg::Filter => ScriptCommandMethod::Filter,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_workspace(s: &str) -> Result<Workspace, String> {
    let (name, path) = match s.split_once('=') {
        Some((name, path)) => (name.trim().to_string(), PathBuf::from(path.trim())),
        None => {
            let path = PathBuf::from(s.trim());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    format!("cannot derive a workspace name from {s:?}; use NAME=PATH")
                })?;
            (name, path)
        }
    };

    if name.is_empty() {
        return Err(format!("empty workspace name in {s:?}"));
    }
    Ok(Workspace::new(name, path))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
