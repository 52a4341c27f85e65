// src/exec/shell.rs

//! Picking the shell a script runs under and materialising its launcher.
//!
//! The command text is never passed on the command line. It is written to a
//! launcher file in the temp directory and the chosen shell runs that file:
//!
//! | mode     | POSIX                        | Windows                           |
//! |----------|------------------------------|-----------------------------------|
//! | `lite`   | `<runtime> run <file>.sh`    | `<runtime> run <file>.sh`         |
//! | `system` | `sh <file>.sh`               | `cmd /d /s /c <file>.cmd`         |

use std::ffi::OsString;
use std::io;

use tracing::debug;

use crate::config::SHELL_DEFAULT_ENV;
use crate::errors::Result;
use crate::types::ShellMode;

use super::temp::{TempArtifact, TempArtifactManager};

/// Argv for running a launcher, plus the launcher itself.
///
/// The caller must call `artifact.cleanup()` once the process has exited.
#[derive(Debug)]
pub struct ShellLaunch {
    pub argv: Vec<OsString>,
    pub artifact: TempArtifact,
}

impl ShellLaunch {
    pub fn program(&self) -> &OsString {
        &self.argv[0]
    }

    pub fn args(&self) -> &[OsString] {
        &self.argv[1..]
    }
}

/// Resolve the shell mode: explicit value, then environment override, then
/// the compiled default ([`ShellMode::Lite`]).
///
/// `"default"` (or an empty string) at either level defers to the next one.
/// Unknown values are configuration errors.
pub fn resolve_shell_mode(explicit: Option<&str>, env_override: Option<&str>) -> Result<ShellMode> {
    if let Some(mode) = explicit_mode(explicit)? {
        return Ok(mode);
    }
    if let Some(mode) = explicit_mode(env_override)? {
        debug!(%mode, "shell mode taken from {SHELL_DEFAULT_ENV}");
        return Ok(mode);
    }
    Ok(ShellMode::default())
}

/// [`resolve_shell_mode`] reading the override from `WSRUN_SHELL_DEFAULT`.
pub fn resolve_shell_mode_from_env(explicit: Option<&str>) -> Result<ShellMode> {
    let env_override = std::env::var(SHELL_DEFAULT_ENV).ok();
    resolve_shell_mode(explicit, env_override.as_deref())
}

fn explicit_mode(value: Option<&str>) -> Result<Option<ShellMode>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("default") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

/// Write `command` into a fresh launcher file and build the argv that runs
/// it under `mode`.
pub fn prepare_launch(
    command: &str,
    mode: ShellMode,
    runtime: &str,
    temp: &TempArtifactManager,
) -> io::Result<ShellLaunch> {
    let launch = match mode {
        ShellMode::Lite => {
            let artifact = temp.create_artifact(".sh", &with_trailing_newline(command), true)?;
            let argv = vec![
                OsString::from(runtime),
                OsString::from("run"),
                artifact.path().as_os_str().to_owned(),
            ];
            ShellLaunch { argv, artifact }
        }
        ShellMode::System => system_launch(command, temp)?,
    };

    debug!(
        %mode,
        launcher = %launch.artifact.path().display(),
        "prepared script launcher"
    );
    Ok(launch)
}

#[cfg(not(windows))]
fn system_launch(command: &str, temp: &TempArtifactManager) -> io::Result<ShellLaunch> {
    let artifact = temp.create_artifact(".sh", &with_trailing_newline(command), true)?;
    // Run through `sh` rather than exec'ing the file so a concurrent fork
    // can't make the exec fail with ETXTBSY.
    let argv = vec![OsString::from("sh"), artifact.path().as_os_str().to_owned()];
    Ok(ShellLaunch { argv, artifact })
}

#[cfg(windows)]
fn system_launch(command: &str, temp: &TempArtifactManager) -> io::Result<ShellLaunch> {
    let script = format!("@echo off\r\n{}\r\n", command.trim_end());
    let artifact = temp.create_artifact(".cmd", &script, true)?;
    let argv = vec![
        OsString::from("cmd"),
        OsString::from("/d"),
        OsString::from("/s"),
        OsString::from("/c"),
        artifact.path().as_os_str().to_owned(),
    ];
    Ok(ShellLaunch { argv, artifact })
}

fn with_trailing_newline(command: &str) -> String {
    let mut s = command.trim_end().to_string();
    s.push('\n');
    s
}
