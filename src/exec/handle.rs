// src/exec/handle.rs

//! The caller-facing side of a single run.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::output::OutputChunk;
use super::result::{ExitResult, RunOutcome};
use super::signal::KillSignal;

/// Lazy, single-pass stream of a run's output.
pub type ChunkStream = BoxStream<'static, OutputChunk>;

/// Resolves once the run has terminated (and its launcher was cleaned up).
pub type ExitFuture<M> = BoxFuture<'static, ExitResult<M>>;

/// Sends termination requests to a live run.
#[derive(Debug, Clone)]
pub struct RunControl {
    tx: Option<mpsc::UnboundedSender<KillSignal>>,
}

impl RunControl {
    /// A control and the receiver the run's supervisor listens on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<KillSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A control for a run that already finished (or never started).
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Ask the run to terminate. Returns `false` if it is no longer live.
    pub fn kill(&self, signal: KillSignal) -> bool {
        match &self.tx {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// A started run: live output, deferred exit result and kill control.
pub struct RunHandle<M> {
    pub output: ChunkStream,
    pub exit: ExitFuture<M>,
    pub control: RunControl,
    launcher: Option<PathBuf>,
}

impl<M> fmt::Debug for RunHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("control", &self.control)
            .field("launcher", &self.launcher)
            .finish_non_exhaustive()
    }
}

impl<M> RunHandle<M> {
    pub fn new(output: ChunkStream, exit: ExitFuture<M>, control: RunControl) -> Self {
        Self {
            output,
            exit,
            control,
            launcher: None,
        }
    }

    pub(crate) fn with_launcher(mut self, path: PathBuf) -> Self {
        self.launcher = Some(path);
        self
    }

    /// Launcher file backing this run, if one was written.
    pub fn launcher_path(&self) -> Option<&Path> {
        self.launcher.as_deref()
    }

    pub fn kill(&self, signal: KillSignal) -> bool {
        self.control.kill(signal)
    }

    pub fn into_parts(self) -> (ChunkStream, ExitFuture<M>, RunControl) {
        (self.output, self.exit, self.control)
    }
}

impl<M: Send + 'static> RunHandle<M> {
    /// A run that is already over: no output, exit result ready.
    pub fn finished(result: ExitResult<M>) -> Self {
        Self::new(
            stream::empty().boxed(),
            futures::future::ready(result).boxed(),
            RunControl::detached(),
        )
    }
}

/// Adapt a chunk receiver into a [`ChunkStream`].
pub fn chunk_stream(mut rx: mpsc::UnboundedReceiver<OutputChunk>) -> ChunkStream {
    stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
}

/// Adapt an exit-result receiver into an [`ExitFuture`].
///
/// If the sending side disappears without reporting, the run is recorded as
/// failed with exit code `-1` so every run still reaches a terminal result.
pub fn exit_future<M: Send + 'static>(
    rx: oneshot::Receiver<ExitResult<M>>,
    metadata: M,
    started_at: DateTime<Utc>,
) -> ExitFuture<M> {
    async move {
        match rx.await {
            Ok(result) => result,
            Err(_) => {
                warn!("run supervisor ended without reporting an exit result");
                ExitResult::new(RunOutcome::Exited { code: -1 }, started_at, Utc::now(), metadata)
            }
        }
    }
    .boxed()
}
