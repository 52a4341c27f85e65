use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use wsrun::exec::{
    ExitResult, OutputChunk, RunControl, RunHandle, RunOutcome, ScriptExecutor, ScriptRun,
    StreamName, chunk_stream, exit_future,
};
use wsrun::types::ShellMode;

/// What the fake saw for one started run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedRun {
    pub command: String,
    pub working_directory: PathBuf,
    pub env: BTreeMap<String, String>,
    pub shell: ShellMode,
}

/// A fake executor that never touches the OS.
///
/// Each command is a `;`-separated list of steps, run in order:
///
/// - `out:TEXT` / `err:TEXT`: emit a stdout / stderr chunk
/// - `sleep:MS`: wait (a kill request ends the run here as signalled)
/// - `exit:CODE`: stop with that exit code (default `0`)
/// - `spawnfail:MESSAGE`: report a spawn failure, nothing else
///
/// e.g. `out:hello; sleep:50; err:oops; exit:2`.
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    started: Arc<Mutex<Vec<StartedRun>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs in start order.
    pub fn started(&self) -> Vec<StartedRun> {
        self.started.lock().unwrap().clone()
    }

    pub fn started_commands(&self) -> Vec<String> {
        self.started().into_iter().map(|r| r.command).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of runs that were live at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Out(StreamName, String),
    Sleep(u64),
    Exit(i32),
    SpawnFail(String),
}

fn parse_steps(command: &str) -> Vec<Step> {
    command
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|step| match step.split_once(':') {
            Some(("out", text)) => Step::Out(StreamName::Stdout, text.to_string()),
            Some(("err", text)) => Step::Out(StreamName::Stderr, text.to_string()),
            Some(("sleep", ms)) => {
                Step::Sleep(ms.trim().parse().expect("sleep takes milliseconds"))
            }
            Some(("exit", code)) => Step::Exit(code.trim().parse().expect("exit takes an integer")),
            Some(("spawnfail", msg)) => Step::SpawnFail(msg.to_string()),
            _ => panic!("unknown fake step: {step:?}"),
        })
        .collect()
}

impl<M> ScriptExecutor<M> for FakeExecutor
where
    M: Clone + Send + Sync + 'static,
{
    fn start(&self, run: ScriptRun<M>) -> RunHandle<M> {
        let started_at = Utc::now();
        let steps = parse_steps(&run.command.command);

        self.started.lock().unwrap().push(StartedRun {
            command: run.command.command.clone(),
            working_directory: run.command.working_directory.clone(),
            env: run.env.clone(),
            shell: run.shell,
        });

        if let Some(Step::SpawnFail(message)) = steps.first() {
            return RunHandle::finished(ExitResult::new(
                RunOutcome::SpawnFailed {
                    message: message.clone(),
                },
                started_at,
                Utc::now(),
                run.metadata,
            ));
        }

        let now_live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_live, Ordering::SeqCst);

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (control, mut kill_rx) = RunControl::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let in_flight = Arc::clone(&self.in_flight);
        let metadata = run.metadata.clone();

        tokio::spawn(async move {
            let mut outcome = RunOutcome::Exited { code: 0 };
            for step in steps {
                match step {
                    Step::Out(stream, text) => {
                        let _ = chunk_tx.send(OutputChunk::new(stream, text.into_bytes()));
                    }
                    Step::Sleep(ms) => {
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                            Some(signal) = kill_rx.recv() => {
                                outcome = RunOutcome::Signaled {
                                    signal: signal.to_string(),
                                    code: 128 + signal.number().unwrap_or(0),
                                };
                                break;
                            }
                        }
                    }
                    Step::Exit(code) => {
                        outcome = RunOutcome::Exited { code };
                        break;
                    }
                    Step::SpawnFail(_) => {}
                }
            }

            drop(chunk_tx);
            kill_rx.close();
            in_flight.fetch_sub(1, Ordering::SeqCst);
            let _ = exit_tx.send(ExitResult::new(outcome, started_at, Utc::now(), metadata));
        });

        RunHandle::new(
            chunk_stream(chunk_rx),
            exit_future(exit_rx, run.metadata, started_at),
            control,
        )
    }
}
