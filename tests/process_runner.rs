// tests/process_runner.rs
#![cfg(unix)]

use std::error::Error;
use std::time::Duration;

use futures::StreamExt;

use wsrun::command::ScriptCommand;
use wsrun::config::RunnerConfig;
use wsrun::exec::{
    KillSignal, OutputChunk, RunHandle, RunOutcome, RunScriptOptions, StreamName,
    TempArtifactManager,
};
use wsrun::{ExitResult, Runner};
use wsrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn runner(base: &std::path::Path) -> Runner {
    Runner::with_temp_manager(
        RunnerConfig::default().with_shell_default("system"),
        TempArtifactManager::with_base_dir(base),
    )
}

async fn finish(handle: RunHandle<()>) -> (Vec<OutputChunk>, ExitResult<()>) {
    let (output, exit, _control) = handle.into_parts();
    with_timeout(futures::future::join(output.collect::<Vec<_>>(), exit)).await
}

fn text(chunks: &[OutputChunk], stream: StreamName) -> String {
    chunks
        .iter()
        .filter(|c| c.stream() == stream)
        .map(OutputChunk::sanitized_text)
        .collect()
}

#[tokio::test]
async fn stdout_and_stderr_arrive_in_emission_order() -> TestResult {
    init_tracing();
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(RunScriptOptions::new(
        ScriptCommand::inline("echo one; sleep 0.2; echo two >&2; sleep 0.2; echo three"),
        (),
    ))?;
    let (chunks, result) = finish(handle).await;

    let seen: Vec<_> = chunks
        .iter()
        .map(|c| (c.stream(), c.sanitized_text()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (StreamName::Stdout, "one\n".to_string()),
            (StreamName::Stderr, "two\n".to_string()),
            (StreamName::Stdout, "three\n".to_string()),
        ]
    );
    assert!(result.success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.signal, None);
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_reported_as_data() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let options = RunScriptOptions::new(ScriptCommand::inline("echo bye; exit 3"), ());
    let handle = runner.run_script(options)?;
    let (chunks, result) = finish(handle).await;

    assert_eq!(text(&chunks, StreamName::Stdout), "bye\n");
    assert_eq!(result.outcome, RunOutcome::Exited { code: 3 });
    assert_eq!(result.exit_code, 3);
    assert!(!result.success);
    assert!(result.end_time >= result.start_time);
    assert!(result.duration_ms >= 0);
    Ok(())
}

#[tokio::test]
async fn interrupt_ends_the_run_and_removes_its_launcher() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(RunScriptOptions::new(
        ScriptCommand::inline("echo started; sleep 30"),
        (),
    ))?;
    let launcher = handle
        .launcher_path()
        .expect("process runs have a launcher")
        .to_path_buf();
    assert!(launcher.exists());

    let (mut output, exit, control) = handle.into_parts();
    let first = with_timeout(output.next()).await.expect("first chunk");
    assert_eq!(first.sanitized_text(), "started\n");

    assert!(control.kill(KillSignal::Interrupt));
    let result = with_timeout(exit).await;

    assert!(!result.success);
    assert!(
        matches!(result.outcome, RunOutcome::Signaled { .. } | RunOutcome::Exited { code: 130 }),
        "{:?}",
        result.outcome
    );
    assert!(!launcher.exists(), "launcher must be gone once the exit result is out");
    assert!(runner.temp().live_artifacts().is_empty());
    Ok(())
}

#[tokio::test]
async fn kill_after_exit_is_a_no_op() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(RunScriptOptions::new(ScriptCommand::inline("true"), ()))?;
    let (output, exit, control) = handle.into_parts();
    let (_, result) = with_timeout(futures::future::join(output.collect::<Vec<_>>(), exit)).await;
    assert!(result.success);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!control.kill(KillSignal::Terminate));
    Ok(())
}

#[tokio::test]
async fn env_overlay_and_force_color_reach_the_child() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(
        RunScriptOptions::new(
            ScriptCommand::inline("echo \"$WSRUN_TEST_VALUE:$FORCE_COLOR\""),
            (),
        )
        .with_env("WSRUN_TEST_VALUE", "hello"),
    )?;
    let (chunks, result) = finish(handle).await;

    assert!(result.success);
    assert_eq!(text(&chunks, StreamName::Stdout), "hello:1\n");
    Ok(())
}

#[tokio::test]
async fn explicit_force_color_is_kept() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(
        RunScriptOptions::new(ScriptCommand::inline("echo \"$FORCE_COLOR\""), ())
            .with_env("FORCE_COLOR", "0"),
    )?;
    let (chunks, _) = finish(handle).await;

    assert_eq!(text(&chunks, StreamName::Stdout), "0\n");
    Ok(())
}

#[tokio::test]
async fn runs_in_the_working_directory() -> TestResult {
    let base = tempfile::tempdir()?;
    let workdir = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(RunScriptOptions::new(
        ScriptCommand::new("pwd -P", workdir.path()),
        (),
    ))?;
    let (chunks, result) = finish(handle).await;

    assert!(result.success);
    let printed = text(&chunks, StreamName::Stdout);
    assert_eq!(
        std::path::Path::new(printed.trim()),
        workdir.path().canonicalize()?
    );
    Ok(())
}

#[tokio::test]
async fn missing_working_directory_is_a_spawn_failure() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(RunScriptOptions::new(
        ScriptCommand::new("echo never", base.path().join("does-not-exist")),
        (),
    ))?;
    let (chunks, result) = finish(handle).await;

    assert!(chunks.is_empty());
    assert!(matches!(result.outcome, RunOutcome::SpawnFailed { .. }), "{:?}", result.outcome);
    assert_eq!(result.exit_code, -1);
    assert!(!result.success);
    assert!(runner.temp().live_artifacts().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_runtime_is_a_spawn_failure() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = Runner::with_temp_manager(
        RunnerConfig::default().with_runtime("wsrun-no-such-runtime-binary"),
        TempArtifactManager::with_base_dir(base.path()),
    );

    let handle = runner.run_script(
        RunScriptOptions::new(ScriptCommand::inline("echo hi"), ()).with_shell("lite"),
    )?;
    let (_, result) = finish(handle).await;

    assert!(matches!(result.outcome, RunOutcome::SpawnFailed { .. }), "{:?}", result.outcome);
    Ok(())
}

#[tokio::test]
async fn invalid_shell_is_rejected_before_spawning() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let err = runner
        .run_script(RunScriptOptions::new(ScriptCommand::inline("echo hi"), ()).with_shell("fish"))
        .unwrap_err();

    assert!(err.to_string().contains("fish"), "{err}");
    assert!(!base.path().read_dir()?.any(|_| true), "no temp dir should be created");
    Ok(())
}

#[tokio::test]
async fn metadata_is_carried_to_the_result() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let handle = runner.run_script(RunScriptOptions::new(ScriptCommand::inline("true"), "pkg-a"))?;
    let (output, exit, _) = handle.into_parts();
    let (_, result) = with_timeout(futures::future::join(output.collect::<Vec<_>>(), exit)).await;

    assert_eq!(result.metadata, "pkg-a");
    Ok(())
}
