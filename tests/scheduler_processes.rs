// tests/scheduler_processes.rs
#![cfg(unix)]

use std::error::Error;

use futures::StreamExt;

use wsrun::config::RunnerConfig;
use wsrun::engine::{ParallelOption, RunScriptsOptions, ScriptsHandle};
use wsrun::exec::{StreamName, TempArtifactManager};
use wsrun::Runner;
use wsrun_test_utils::builders::{ScriptsBuilder, labels};
use wsrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn runner(base: &std::path::Path) -> Runner {
    Runner::with_temp_manager(
        RunnerConfig::default().with_shell_default("system"),
        TempArtifactManager::with_base_dir(base),
    )
}

#[tokio::test]
async fn unbounded_parallel_output_arrives_by_completion() -> TestResult {
    init_tracing();
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let scripts = ScriptsBuilder::new()
        .script("one", "sleep 0.5; echo 1")
        .script("two", "echo 2; exit 2")
        .script("three", "sleep 0.25; echo 3")
        .build();
    let options =
        RunScriptsOptions::new(scripts).with_parallel(ParallelOption::Max("unbounded".into()));

    let ScriptsHandle { output, summary, .. } = runner.run_scripts(options)?;
    let (chunks, summary) =
        with_timeout(futures::future::join(output.collect::<Vec<_>>(), summary)).await;
    let summary = summary?;

    let arrival: Vec<_> = chunks
        .iter()
        .filter(|c| c.chunk.stream() == StreamName::Stdout)
        .map(|c| c.chunk.sanitized_text().trim().to_string())
        .collect();
    assert_eq!(arrival, vec!["2", "3", "1"]);

    assert_eq!(
        (summary.total_count, summary.success_count, summary.failure_count, summary.all_success),
        (3, 2, 1, false)
    );
    assert_eq!(labels(&summary.results), vec!["one", "two", "three"]);
    assert_eq!(summary.results[1].exit_code, 2);
    assert!(runner.temp().live_artifacts().is_empty());
    Ok(())
}

#[tokio::test]
async fn serial_processes_keep_input_order() -> TestResult {
    let base = tempfile::tempdir()?;
    let runner = runner(base.path());

    let scripts = ScriptsBuilder::new()
        .script("slow", "sleep 0.3; echo slow")
        .script("fast", "echo fast")
        .build();

    let ScriptsHandle {
        output, summary, ..
    } = runner.run_scripts(RunScriptsOptions::new(scripts))?;
    let (chunks, summary) =
        with_timeout(futures::future::join(output.collect::<Vec<_>>(), summary)).await;
    let summary = summary?;

    let order: Vec<_> = chunks.iter().map(|c| c.metadata.as_str()).collect();
    assert_eq!(order, vec!["slow", "fast"]);
    assert!(summary.all_success);
    assert!(summary.results[0].end_time <= summary.results[1].start_time);
    Ok(())
}
