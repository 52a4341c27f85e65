#![allow(dead_code)]

use wsrun::command::{ScriptCommand, Workspace};
use wsrun::engine::ScheduledScript;

/// Workspace declaring the given scripts.
pub fn workspace(name: &str, path: &str, scripts: &[&str]) -> Workspace {
    scripts
        .iter()
        .fold(Workspace::new(name, path), |ws, script| ws.with_script(*script))
}

/// Builder for a batch of scripts whose metadata is a plain label.
#[derive(Debug, Default)]
pub struct ScriptsBuilder {
    scripts: Vec<ScheduledScript<String>>,
}

impl ScriptsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script run from the current directory.
    pub fn script(mut self, label: &str, command: &str) -> Self {
        self.scripts
            .push(ScheduledScript::new(label.to_string(), ScriptCommand::inline(command)));
        self
    }

    /// Add a script with one per-script env entry.
    pub fn script_with_env(mut self, label: &str, command: &str, key: &str, value: &str) -> Self {
        let scheduled = ScheduledScript::new(label.to_string(), ScriptCommand::inline(command));
        self.scripts.push(scheduled.with_env(key, value));
        self
    }

    pub fn build(self) -> Vec<ScheduledScript<String>> {
        self.scripts
    }
}

/// Labels of a batch's results, in result order.
pub fn labels<'a>(results: impl IntoIterator<Item = &'a wsrun::ExitResult<String>>) -> Vec<String> {
    results.into_iter().map(|r| r.metadata.clone()).collect()
}
