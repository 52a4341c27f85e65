// src/command.rs

//! Turning a (workspace, script, args) request into a concrete command line.
//!
//! Everything here is pure: no filesystem access, no environment lookups.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::ScriptCommandMethod;

pub const PROJECT_PATH_ENV: &str = "WSRUN_PROJECT_PATH";
pub const WORKSPACE_NAME_ENV: &str = "WSRUN_WORKSPACE_NAME";
pub const WORKSPACE_PATH_ENV: &str = "WSRUN_WORKSPACE_PATH";
pub const SCRIPT_NAME_ENV: &str = "WSRUN_SCRIPT_NAME";

/// One package of the monorepo, as resolved by workspace discovery.
///
/// `path` is relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            aliases: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.scripts.push(script.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn has_script(&self, script: &str) -> bool {
        self.scripts.iter().any(|s| s == script)
    }

    /// Absolute (root-joined) directory of this workspace.
    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

/// A command line plus the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCommand {
    pub command: String,
    pub working_directory: PathBuf,
}

impl ScriptCommand {
    pub fn new(command: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_directory: working_directory.into(),
        }
    }

    /// Command run from the current directory.
    pub fn inline(command: impl Into<String>) -> Self {
        Self::new(command, PathBuf::new())
    }
}

/// Inputs for [`create_script_command`].
#[derive(Debug, Clone, Copy)]
pub struct ScriptCommandRequest<'a> {
    pub workspace: &'a Workspace,
    pub script: &'a str,
    pub args: &'a str,
    pub method: ScriptCommandMethod,
    pub root: &'a Path,
    pub runtime: &'a str,
}

/// Build the `<runtime> run ...` command for a workspace script.
///
/// - `cd`: `<runtime> run <script> <args>` in the workspace directory.
/// - `filter`: `<runtime> run --filter="<name>" <script> <args>` in the root.
///
/// `args` is trimmed and interpolated (see [`interpolate`]); the separating
/// space only appears when there are args.
pub fn create_script_command(req: ScriptCommandRequest<'_>) -> ScriptCommand {
    let args = interpolate(req.args, req.workspace, req.script, req.root);
    let args = args.trim();

    let (invocation, working_directory) = match req.method {
        ScriptCommandMethod::Cd => (
            format!("{} run {}", req.runtime, req.script),
            req.workspace.directory(req.root),
        ),
        ScriptCommandMethod::Filter => (
            format!(
                "{} run --filter={} {}",
                req.runtime,
                quote(&req.workspace.name),
                req.script
            ),
            req.root.to_path_buf(),
        ),
    };

    let command = if args.is_empty() {
        invocation
    } else {
        format!("{invocation} {args}")
    };

    ScriptCommand {
        command,
        working_directory,
    }
}

/// Build a command for an ad hoc inline script run inside a workspace.
///
/// `script_name` is only used for `<scriptName>` interpolation.
pub fn create_inline_command(
    workspace: &Workspace,
    inline: &str,
    script_name: &str,
    args: &str,
    root: &Path,
) -> ScriptCommand {
    let body = interpolate(inline, workspace, script_name, root);
    let args = interpolate(args, workspace, script_name, root);
    let (body, args) = (body.trim(), args.trim());

    let command = if args.is_empty() {
        body.to_string()
    } else {
        format!("{body} {args}")
    };

    ScriptCommand {
        command,
        working_directory: workspace.directory(root),
    }
}

/// Replace `<workspaceName>`, `<workspacePath>`, `<projectPath>` and
/// `<scriptName>` placeholders.
pub fn interpolate(text: &str, workspace: &Workspace, script: &str, root: &Path) -> String {
    if !text.contains('<') {
        return text.to_string();
    }
    text.replace("<workspaceName>", &workspace.name)
        .replace(
            "<workspacePath>",
            &workspace.directory(root).to_string_lossy(),
        )
        .replace("<projectPath>", &root.to_string_lossy())
        .replace("<scriptName>", script)
}

/// Runtime metadata exposed to inline scripts.
pub fn script_env_vars(
    workspace: &Workspace,
    script: &str,
    root: &Path,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            PROJECT_PATH_ENV.to_string(),
            root.to_string_lossy().into_owned(),
        ),
        (WORKSPACE_NAME_ENV.to_string(), workspace.name.clone()),
        (
            WORKSPACE_PATH_ENV.to_string(),
            workspace.directory(root).to_string_lossy().into_owned(),
        ),
        (SCRIPT_NAME_ENV.to_string(), script.to_string()),
    ])
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
