// src/stream.rs

//! Fair fan-in of several streams into one.
//!
//! [`merge_streams`] keeps exactly one pending "next item" future per live
//! input and races them: whichever input produces first is yielded first.
//! There is no round-robin and no index ordering. An input that finishes is
//! retired from the race; the others keep going. The merged stream ends once
//! every input has ended.
//!
//! Used to interleave a process's stdout with its stderr, and the tagged
//! output of every run in a batch.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::stream::{FuturesUnordered, Stream, StreamExt, StreamFuture};

/// Stream returned by [`merge_streams`].
#[must_use = "streams do nothing unless polled"]
pub struct MergedStream<S> {
    pending: FuturesUnordered<StreamFuture<S>>,
    done: bool,
}

/// Merge `streams` by arrival order.
pub fn merge_streams<S>(streams: impl IntoIterator<Item = S>) -> MergedStream<S>
where
    S: Stream + Unpin,
{
    let pending: FuturesUnordered<_> = streams.into_iter().map(StreamExt::into_future).collect();
    let done = pending.is_empty();
    MergedStream { pending, done }
}

impl<S: Stream + Unpin> MergedStream<S> {
    /// Add another input to the race. A merge whose inputs had all ended is
    /// re-opened: it yields the new input's items and ends again after it.
    pub fn push(&mut self, stream: S) {
        self.pending.push(stream.into_future());
        self.done = false;
    }

    /// Inputs that have not finished yet.
    pub fn active(&self) -> usize {
        self.pending.len()
    }
}

impl<S: Stream + Unpin> Stream for MergedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.pending.poll_next_unpin(cx)) {
                Some((Some(item), rest)) => {
                    // Re-arm before yielding so this input keeps progressing.
                    this.pending.push(rest.into_future());
                    return Poll::Ready(Some(item));
                }
                // Exhausted input: drop it from the race.
                Some((None, _)) => continue,
                None => {
                    this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}
