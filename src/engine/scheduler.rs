// src/engine/scheduler.rs

//! Running a batch of scripts, serially or with a bounded pool.
//!
//! Every submitted script gets exactly one [`ExitResult`]. A failure (non-zero
//! exit, signal, spawn error) is just a result: it never stops or cancels the
//! other scripts. The only way to stop a batch early is an explicit
//! [`ScriptsCanceller::cancel`].
//!
//! Each run's output is tagged with its metadata and pushed into one
//! [`merge_streams`] fan-in as the run starts. A run occupies its pool slot
//! until its process has exited *and* its output has been drained from the
//! merged stream (or the caller dropped that stream). With a cap of 1 this
//! makes parallel mode behave exactly like serial mode, including output
//! order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::task::Poll;

use chrono::Utc;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream, FuturesUnordered};
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::command::ScriptCommand;
use crate::config::{
    ParallelSetting, RunnerConfig, available_processors, determine_parallel_max_with,
};
use crate::errors::{Result, WsrunError};
use crate::exec::{
    ExitResult, KillSignal, OutputChunk, RunControl, RunOutcome, ScriptExecutor, ScriptRun,
    resolve_shell_mode,
};
use crate::stream::{MergedStream, merge_streams};
use crate::types::{ConcurrencyLimit, ShellMode};

use super::summary::RunSummary;

/// One entry of a batch: caller metadata plus the command to run.
#[derive(Debug, Clone)]
pub struct ScheduledScript<M> {
    pub metadata: M,
    pub command: ScriptCommand,
    /// Per-script env entries, layered over the batch's shared overlay.
    pub env: BTreeMap<String, String>,
}

impl<M> ScheduledScript<M> {
    pub fn new(metadata: M, command: ScriptCommand) -> Self {
        Self {
            metadata,
            command,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// How many scripts of a batch may run at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParallelOption {
    /// One at a time, in submission order.
    #[default]
    Serial,
    /// Parallel, capped by the `"default"` directive.
    Default,
    /// Parallel, capped by an explicit directive.
    Max(ParallelSetting),
}

impl From<bool> for ParallelOption {
    fn from(parallel: bool) -> Self {
        if parallel {
            ParallelOption::Default
        } else {
            ParallelOption::Serial
        }
    }
}

impl From<ConcurrencyLimit> for ParallelOption {
    fn from(limit: ConcurrencyLimit) -> Self {
        match limit {
            ConcurrencyLimit::Limited(n) => ParallelOption::Max(ParallelSetting::from(n.get())),
            ConcurrencyLimit::Unbounded => ParallelOption::Max(ParallelSetting::from("unbounded")),
        }
    }
}

impl ParallelOption {
    /// Concrete cap for this option; serial mode is a cap of 1.
    pub fn resolve(
        &self,
        default_override: Option<&str>,
        processors: usize,
    ) -> Result<ConcurrencyLimit> {
        match self {
            ParallelOption::Serial => Ok(ConcurrencyLimit::limited(1)),
            ParallelOption::Default => {
                determine_parallel_max_with("default", default_override, processors)
            }
            ParallelOption::Max(setting) => {
                determine_parallel_max_with(setting.clone(), default_override, processors)
            }
        }
    }
}

/// Caller options for [`run_scripts`].
#[derive(Debug, Clone)]
pub struct RunScriptsOptions<M> {
    pub scripts: Vec<ScheduledScript<M>>,
    pub parallel: ParallelOption,
    /// Shared env overlay for every script.
    pub env: BTreeMap<String, String>,
    /// `lite`, `system` or `default`; `None` behaves like `default`.
    pub shell: Option<String>,
}

impl<M> RunScriptsOptions<M> {
    pub fn new(scripts: Vec<ScheduledScript<M>>) -> Self {
        Self {
            scripts,
            parallel: ParallelOption::Serial,
            env: BTreeMap::new(),
            shell: None,
        }
    }

    pub fn with_parallel(mut self, parallel: impl Into<ParallelOption>) -> Self {
        self.parallel = parallel.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

/// An output chunk tagged with the metadata of the run that produced it.
#[derive(Debug, Clone)]
pub struct TaggedChunk<M> {
    pub metadata: M,
    pub chunk: OutputChunk,
}

pub type TaggedStream<M> = BoxStream<'static, TaggedChunk<M>>;

/// Resolves once every script of the batch has a result.
pub type SummaryFuture<M> = BoxFuture<'static, Result<RunSummary<M>>>;

/// Stops a running batch.
#[derive(Debug, Clone)]
pub struct ScriptsCanceller {
    tx: Arc<watch::Sender<Option<KillSignal>>>,
}

impl ScriptsCanceller {
    /// Send `signal` to every run in flight and mark every run that hasn't
    /// started yet as [`RunOutcome::Cancelled`]. Returns `false` if the batch
    /// has already finished.
    pub fn cancel(&self, signal: KillSignal) -> bool {
        self.tx.send(Some(signal)).is_ok()
    }
}

/// A started batch.
///
/// `output` must be drained or dropped: a run keeps its pool slot until its
/// output has been consumed.
pub struct ScriptsHandle<M> {
    pub output: TaggedStream<M>,
    pub summary: SummaryFuture<M>,
    pub canceller: ScriptsCanceller,
}

impl<M> fmt::Debug for ScriptsHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptsHandle")
            .field("canceller", &self.canceller)
            .finish_non_exhaustive()
    }
}

/// Start a batch.
///
/// Shell mode and concurrency are resolved up front; invalid values are
/// returned as configuration errors and nothing is spawned. Must be called
/// from within a Tokio runtime.
pub fn run_scripts<M, E>(
    options: RunScriptsOptions<M>,
    config: &RunnerConfig,
    executor: Arc<E>,
) -> Result<ScriptsHandle<M>>
where
    M: Clone + Send + Sync + 'static,
    E: ScriptExecutor<M> + ?Sized,
{
    let shell = resolve_shell_mode(options.shell.as_deref(), config.shell_default.as_deref())?;
    let limit = options
        .parallel
        .resolve(config.parallel_default.as_deref(), available_processors())?;

    info!(
        scripts = options.scripts.len(),
        parallel = ?options.parallel,
        %limit,
        %shell,
        "running scripts"
    );

    let (outputs_tx, outputs_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(None);

    let batch = Batch {
        executor,
        env: options.env,
        shell,
        limit,
        outputs_tx,
    };
    let task = tokio::spawn(batch.drive(options.scripts, cancel_rx));

    let summary = async move {
        task.await.map_err(|e| {
            WsrunError::Other(anyhow::Error::new(e).context("script scheduler task failed"))
        })
    }
    .boxed();

    Ok(ScriptsHandle {
        output: batch_output(outputs_rx),
        summary,
        canceller: ScriptsCanceller {
            tx: Arc::new(cancel_tx),
        },
    })
}

/// Merged output of a batch. Runs join the merge as they start; the stream
/// ends once the batch is over and every run's output has ended.
fn batch_output<M: Send + 'static>(
    mut outputs: mpsc::UnboundedReceiver<TaggedStream<M>>,
) -> TaggedStream<M> {
    let mut merged: MergedStream<TaggedStream<M>> = merge_streams(Vec::new());
    let mut starting = true;

    stream::poll_fn(move |cx| {
        while starting {
            match outputs.poll_recv(cx) {
                Poll::Ready(Some(output)) => merged.push(output),
                Poll::Ready(None) => starting = false,
                Poll::Pending => break,
            }
        }

        if let Poll::Ready(Some(tagged)) = merged.poll_next_unpin(cx) {
            return Poll::Ready(Some(tagged));
        }
        if starting || merged.active() > 0 {
            Poll::Pending
        } else {
            Poll::Ready(None)
        }
    })
    .boxed()
}

struct Batch<M, E: ?Sized> {
    executor: Arc<E>,
    env: BTreeMap<String, String>,
    shell: ShellMode,
    limit: ConcurrencyLimit,
    outputs_tx: mpsc::UnboundedSender<TaggedStream<M>>,
}

impl<M, E> Batch<M, E>
where
    M: Clone + Send + Sync + 'static,
    E: ScriptExecutor<M> + ?Sized,
{
    async fn drive(
        self,
        scripts: Vec<ScheduledScript<M>>,
        mut cancel_rx: watch::Receiver<Option<KillSignal>>,
    ) -> RunSummary<M> {
        let start_time = Utc::now();
        let total = scripts.len();

        let mut results: Vec<Option<ExitResult<M>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        let mut queue = scripts.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut controls: HashMap<usize, RunControl> = HashMap::new();
        let mut cancelled: Option<KillSignal> = None;
        let mut cancel_open = true;

        loop {
            if cancelled.is_none() {
                while self.limit.allows(in_flight.len()) {
                    let Some((index, script)) = queue.next() else {
                        break;
                    };
                    let (run, control) = self.start(index, script);
                    controls.insert(index, control);
                    in_flight.push(run);
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                Some((index, result)) = in_flight.next() => {
                    let result: ExitResult<M> = result;
                    debug!(
                        index,
                        exit_code = result.exit_code,
                        success = result.success,
                        "script finished"
                    );
                    controls.remove(&index);
                    results[index] = Some(result);
                }
                changed = cancel_rx.changed(), if cancel_open && cancelled.is_none() => {
                    if changed.is_err() {
                        // Canceller dropped; nobody can cancel anymore.
                        cancel_open = false;
                        continue;
                    }
                    let requested = *cancel_rx.borrow_and_update();
                    if let Some(signal) = requested {
                        warn!(%signal, in_flight = controls.len(), "cancelling script batch");
                        for control in controls.values() {
                            control.kill(signal);
                        }
                        cancelled = Some(signal);
                    }
                }
            }
        }

        let end_time = Utc::now();
        for (index, script) in queue {
            debug!(index, "script cancelled before start");
            results[index] = Some(ExitResult::new(
                RunOutcome::Cancelled,
                end_time,
                end_time,
                script.metadata,
            ));
        }

        let results = results.into_iter().flatten().collect();
        let summary = RunSummary::new(results, start_time, end_time);
        info!(
            total = summary.total_count,
            succeeded = summary.success_count,
            failed = summary.failure_count,
            duration_ms = summary.duration_ms,
            "script batch finished"
        );
        summary
    }

    /// Start one script and hand its tagged output to the merged stream.
    /// The returned future resolves with the script's result once it has
    /// exited and its output has been drained.
    fn start(
        &self,
        index: usize,
        script: ScheduledScript<M>,
    ) -> (BoxFuture<'static, (usize, ExitResult<M>)>, RunControl) {
        let ScheduledScript {
            metadata,
            command,
            env,
        } = script;

        let mut run_env = self.env.clone();
        run_env.extend(env);

        debug!(index, cmd = %command.command, "starting script");
        let handle = self.executor.start(ScriptRun {
            metadata: metadata.clone(),
            command,
            env: run_env,
            shell: self.shell,
        });
        let (output, exit, control) = handle.into_parts();

        let (drained_tx, drained_rx) = oneshot::channel::<()>();
        let end_marker = stream::once(async move {
            let _ = drained_tx.send(());
        })
        .filter_map(|()| future::ready(None));
        let tagged = output
            .map(move |chunk| TaggedChunk {
                metadata: metadata.clone(),
                chunk,
            })
            .chain(end_marker)
            .boxed();

        // A dropped output stream drops `drained_tx` too, which also counts
        // as drained.
        let _ = self.outputs_tx.send(tagged);

        let run = async move {
            let (_, result) = futures::join!(drained_rx, exit);
            (index, result)
        }
        .boxed();

        (run, control)
    }
}
