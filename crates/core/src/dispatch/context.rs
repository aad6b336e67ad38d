//! Completion contexts
//!
//! Where a call's completion runs is chosen by the caller. Three contexts are
//! provided: a Tokio runtime, the task that finished the call, and a channel
//! drained by a caller-owned loop (the "main queue" of an application).

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

use crate::ports::{CompletionContext, Job};

/// Runs completions as tasks on a Tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    handle: Handle,
}

impl RuntimeContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Context for the runtime of the calling task, if there is one.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl CompletionContext for RuntimeContext {
    fn execute(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }
}

/// Runs completions directly on the task that finished the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerContext;

impl CompletionContext for WorkerContext {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Queues completions for a [`CompletionQueue`] owned by the caller.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl ChannelContext {
    pub fn new() -> (Self, CompletionQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CompletionQueue { rx })
    }
}

impl CompletionContext for ChannelContext {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("Completion queue closed, dropping completion");
        }
    }
}

/// Receiving end of a [`ChannelContext`].
pub struct CompletionQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl CompletionQueue {
    /// Runs completions until every [`ChannelContext`] clone is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job();
        }
    }

    /// Waits for and runs the next completion. Returns `false` once closed.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs every completion already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn channel_context_defers_until_drained() {
        let (context, mut queue) = ChannelContext::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            context.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(queue.drain(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn runtime_context_spawns() {
        let context = RuntimeContext::try_current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        context.execute(Box::new(move || {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn queue_run_stops_when_senders_drop() {
        let (context, queue) = ChannelContext::new();
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let counter = Arc::clone(&counter);
            context.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        drop(context);
        queue.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
