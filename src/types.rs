use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::WsrunError;

/// How a script command is executed once written to its launcher file.
///
/// - `Lite`: through the project runtime's own portable shell
///   (`<runtime> run <launcher>`). This is the compiled default.
/// - `System`: through the operating system shell (`sh` on POSIX, a batch
///   wrapper run by `cmd` on Windows), which supports OS built-ins the lite
///   grammar lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellMode {
    #[default]
    Lite,
    System,
}

impl fmt::Display for ShellMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellMode::Lite => f.write_str("lite"),
            ShellMode::System => f.write_str("system"),
        }
    }
}

impl FromStr for ShellMode {
    type Err = WsrunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lite" | "bun" => Ok(ShellMode::Lite),
            "system" | "sh" => Ok(ShellMode::System),
            other => Err(WsrunError::config(format!(
                "invalid shell mode: {other:?} (expected \"lite\", \"system\" or \"default\")"
            ))),
        }
    }
}

/// Where a workspace script is launched from.
///
/// - `Cd`: run `<runtime> run <script>` inside the workspace directory.
/// - `Filter`: run `<runtime> run --filter=<name> <script>` from the project
///   root and let the runtime locate the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptCommandMethod {
    #[default]
    Cd,
    Filter,
}

impl FromStr for ScriptCommandMethod {
    type Err = WsrunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cd" => Ok(ScriptCommandMethod::Cd),
            "filter" => Ok(ScriptCommandMethod::Filter),
            other => Err(WsrunError::config(format!(
                "invalid script command method: {other:?} (expected \"cd\" or \"filter\")"
            ))),
        }
    }
}

/// Maximum number of runs allowed in flight at once.
///
/// A zero or negative limit cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyLimit {
    Limited(NonZeroUsize),
    Unbounded,
}

impl ConcurrencyLimit {
    /// Build a limited cap, clamping `0` up to `1`.
    pub fn limited(n: usize) -> Self {
        ConcurrencyLimit::Limited(NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN))
    }

    /// `None` means unbounded.
    pub fn get(&self) -> Option<usize> {
        match self {
            ConcurrencyLimit::Limited(n) => Some(n.get()),
            ConcurrencyLimit::Unbounded => None,
        }
    }

    pub fn allows(&self, in_flight: usize) -> bool {
        match self {
            ConcurrencyLimit::Limited(n) => in_flight < n.get(),
            ConcurrencyLimit::Unbounded => true,
        }
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyLimit::Limited(n) => write!(f, "{n}"),
            ConcurrencyLimit::Unbounded => f.write_str("unbounded"),
        }
    }
}
