//! Serial lanes
//!
//! A lane is a single worker task draining an unbounded FIFO of call
//! futures, so at most one call per lane is in flight and calls run in
//! submission order. A lane with no queued or running call is idle and may
//! be dropped by its owner; its worker then stops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub(crate) type LaneJob = BoxFuture<'static, ()>;

pub(crate) struct SerialLane {
    name: String,
    tx: mpsc::UnboundedSender<LaneJob>,
    pending: Arc<AtomicUsize>,
}

impl SerialLane {
    pub(crate) fn spawn(runtime: &Handle, name: String, shutdown: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LaneJob>();
        let lane = name.clone();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        runtime.spawn(async move {
            debug!(lane = %lane, "Serial lane started");
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => {
                            trace!(lane = %lane, "Running queued call");
                            job.await;
                            worker_pending.fetch_sub(1, Ordering::AcqRel);
                        }
                        None => break,
                    },
                }
            }
            // Queued calls observe the cancellation and return without running.
            rx.close();
            while let Some(job) = rx.recv().await {
                job.await;
                worker_pending.fetch_sub(1, Ordering::AcqRel);
            }
            debug!(lane = %lane, "Serial lane stopped");
        });

        Self { name, tx, pending }
    }

    /// Queues `job`. Returns `false` when the lane has shut down.
    pub(crate) fn submit(&self, job: LaneJob) -> bool {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            debug!(lane = %self.name, "Serial lane closed, call dropped");
            return false;
        }
        true
    }

    /// No call is queued or running.
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
