// tests/shell_executor.rs

use std::error::Error;
use std::ffi::OsString;
use std::fs;

use wsrun::errors::WsrunError;
use wsrun::exec::{TempArtifactManager, prepare_launch, resolve_shell_mode};
use wsrun::types::ShellMode;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn explicit_mode_wins_over_override() -> TestResult {
    assert_eq!(resolve_shell_mode(Some("system"), Some("lite"))?, ShellMode::System);
    assert_eq!(resolve_shell_mode(Some("lite"), Some("system"))?, ShellMode::Lite);
    Ok(())
}

#[test]
fn default_defers_to_override_then_lite() -> TestResult {
    assert_eq!(resolve_shell_mode(None, Some("system"))?, ShellMode::System);
    assert_eq!(resolve_shell_mode(Some("default"), Some("system"))?, ShellMode::System);
    assert_eq!(resolve_shell_mode(Some("default"), Some("default"))?, ShellMode::Lite);
    assert_eq!(resolve_shell_mode(None, Some(""))?, ShellMode::Lite);
    assert_eq!(resolve_shell_mode(None, None)?, ShellMode::Lite);
    Ok(())
}

#[test]
fn aliases_and_case_are_accepted() -> TestResult {
    assert_eq!(resolve_shell_mode(Some("BUN"), None)?, ShellMode::Lite);
    assert_eq!(resolve_shell_mode(Some("sh"), None)?, ShellMode::System);
    assert_eq!(resolve_shell_mode(Some(" System "), None)?, ShellMode::System);
    Ok(())
}

#[test]
fn unknown_modes_are_config_errors() {
    let err = resolve_shell_mode(Some("zsh"), None).unwrap_err();
    assert!(matches!(err, WsrunError::ConfigError(_)), "{err:?}");

    // A bad override is an error too, even without an explicit value.
    assert!(resolve_shell_mode(None, Some("powershell")).is_err());
}

#[test]
fn lite_launch_runs_the_file_through_the_runtime() -> TestResult {
    let base = tempfile::tempdir()?;
    let temp = TempArtifactManager::with_base_dir(base.path());

    let launch = prepare_launch("echo hi", ShellMode::Lite, "bun", &temp)?;

    assert_eq!(launch.program(), &OsString::from("bun"));
    assert_eq!(launch.args()[0], OsString::from("run"));
    assert_eq!(launch.args()[1].as_os_str(), launch.artifact.path().as_os_str());
    assert_eq!(fs::read_to_string(launch.artifact.path())?, "echo hi\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn system_launch_runs_the_file_through_sh() -> TestResult {
    let base = tempfile::tempdir()?;
    let temp = TempArtifactManager::with_base_dir(base.path());

    let launch = prepare_launch("echo one\necho two\n\n", ShellMode::System, "bun", &temp)?;

    assert_eq!(launch.program(), &OsString::from("sh"));
    assert_eq!(launch.args(), &[launch.artifact.path().as_os_str().to_owned()]);
    assert_eq!(fs::read_to_string(launch.artifact.path())?, "echo one\necho two\n");
    Ok(())
}

#[test]
fn each_launch_gets_its_own_file() -> TestResult {
    let base = tempfile::tempdir()?;
    let temp = TempArtifactManager::with_base_dir(base.path());

    let a = prepare_launch("echo a", ShellMode::System, "bun", &temp)?;
    let b = prepare_launch("echo b", ShellMode::System, "bun", &temp)?;

    assert_ne!(a.artifact.path(), b.artifact.path());
    assert_eq!(temp.live_artifacts().len(), 2);

    a.artifact.cleanup();
    assert_eq!(temp.live_artifacts(), vec![b.artifact.path().to_path_buf()]);
    Ok(())
}
