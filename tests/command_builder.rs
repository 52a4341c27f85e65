// tests/command_builder.rs

use std::path::{Path, PathBuf};

use wsrun::command::{
    PROJECT_PATH_ENV, SCRIPT_NAME_ENV, ScriptCommandRequest, WORKSPACE_NAME_ENV, WORKSPACE_PATH_ENV,
    create_inline_command, create_script_command, interpolate, script_env_vars,
};
use wsrun::types::ScriptCommandMethod;
use wsrun_test_utils::builders::workspace;

fn request<'a>(
    ws: &'a wsrun::Workspace,
    args: &'a str,
    method: ScriptCommandMethod,
    root: &'a Path,
) -> ScriptCommandRequest<'a> {
    ScriptCommandRequest {
        workspace: ws,
        script: "build",
        args,
        method,
        root,
        runtime: "bun",
    }
}

#[test]
fn cd_method_runs_in_workspace_directory() {
    let ws = workspace("app-a", "packages/a", &["build"]);
    let root = Path::new("/repo");

    let cmd = create_script_command(request(&ws, "", ScriptCommandMethod::Cd, root));

    assert_eq!(cmd.command, "bun run build");
    assert_eq!(cmd.working_directory, PathBuf::from("/repo/packages/a"));
}

#[test]
fn filter_method_runs_in_root_with_quoted_name() {
    let ws = workspace("@scope/app-a", "packages/a", &["build"]);
    let root = Path::new("/repo");

    let cmd = create_script_command(request(&ws, "--watch", ScriptCommandMethod::Filter, root));

    assert_eq!(cmd.command, "bun run --filter=\"@scope/app-a\" build --watch");
    assert_eq!(cmd.working_directory, PathBuf::from("/repo"));
}

#[test]
fn args_are_trimmed_and_only_separated_when_present() {
    let ws = workspace("a", "packages/a", &["build"]);
    let root = Path::new("/repo");

    let blank = create_script_command(request(&ws, "   ", ScriptCommandMethod::Cd, root));
    assert_eq!(blank.command, "bun run build");

    let padded = create_script_command(request(&ws, "  --flag  ", ScriptCommandMethod::Cd, root));
    assert_eq!(padded.command, "bun run build --flag");
}

#[test]
fn args_placeholders_are_interpolated() {
    let ws = workspace("a", "packages/a", &["build"]);
    let root = Path::new("/repo");

    let cmd = create_script_command(request(
        &ws,
        "--name=<workspaceName> --out=<workspacePath>/dist --script=<scriptName>",
        ScriptCommandMethod::Cd,
        root,
    ));

    assert_eq!(
        cmd.command,
        "bun run build --name=a --out=/repo/packages/a/dist --script=build"
    );
}

#[test]
fn runtime_executable_is_configurable() {
    let ws = workspace("a", "packages/a", &["test"]);
    let root = Path::new("/repo");
    let req = ScriptCommandRequest {
        workspace: &ws,
        script: "test",
        args: "",
        method: ScriptCommandMethod::Cd,
        root,
        runtime: "/opt/bun/bin/bun",
    };

    assert_eq!(create_script_command(req).command, "/opt/bun/bin/bun run test");
}

#[test]
fn inline_command_interpolates_body_and_args() {
    let ws = workspace("a", "packages/a", &[]);
    let root = Path::new("/repo");

    let script = "echo <workspaceName> <projectPath>";
    let cmd = create_inline_command(&ws, script, "hello", " extra ", root);

    assert_eq!(cmd.command, "echo a /repo extra");
    assert_eq!(cmd.working_directory, PathBuf::from("/repo/packages/a"));
}

#[test]
fn interpolate_leaves_plain_text_alone() {
    let ws = workspace("a", "packages/a", &[]);
    assert_eq!(interpolate("plain text", &ws, "s", Path::new("/r")), "plain text");
    assert_eq!(interpolate("<unknown>", &ws, "s", Path::new("/r")), "<unknown>");
}

#[test]
fn script_env_vars_expose_run_metadata() {
    let ws = workspace("a", "packages/a", &[]);
    let vars = script_env_vars(&ws, "lint", Path::new("/repo"));

    assert_eq!(vars[PROJECT_PATH_ENV], "/repo");
    assert_eq!(vars[WORKSPACE_NAME_ENV], "a");
    assert_eq!(vars[WORKSPACE_PATH_ENV], "/repo/packages/a");
    assert_eq!(vars[SCRIPT_NAME_ENV], "lint");
    assert_eq!(vars.len(), 4);
}
