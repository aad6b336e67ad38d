//! Call handles
//!
//! A [`CallHandle`] observes and controls one dispatched call. Its state only
//! moves forward: `Ready -> Executing -> Finished`, or to `Canceled` from any
//! state that is not done yet.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Ready,
    Executing,
    Finished,
    Canceled,
}

impl CallState {
    pub fn is_done(self) -> bool {
        matches!(self, Self::Finished | Self::Canceled)
    }
}

struct CallInner {
    id: u64,
    state: watch::Sender<CallState>,
    token: CancellationToken,
}

/// Handle to a dispatched call. Cheap to clone.
#[derive(Clone)]
pub struct CallHandle {
    inner: Arc<CallInner>,
}

impl CallHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        let (state, _) = watch::channel(CallState::Ready);
        let id = NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed);
        Self { inner: Arc::new(CallInner { id, state, token }) }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> CallState {
        *self.inner.state.borrow()
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == CallState::Canceled || self.inner.token.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// Cancels the call. A call that has not started never starts; a call in
    /// flight never delivers its completion. No effect once finished.
    pub fn cancel(&self) {
        let canceled = self.inner.state.send_if_modified(|state| {
            if state.is_done() {
                false
            } else {
                *state = CallState::Canceled;
                true
            }
        });
        if canceled {
            debug!(call = self.inner.id, "Call canceled");
            self.inner.token.cancel();
        }
    }

    /// Resolves once the call is finished or canceled.
    pub async fn done(&self) {
        let mut state = self.inner.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = state.wait_for(|state| state.is_done()).await;
    }

    /// Resolves when the call's cancellation token fires.
    pub(crate) async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// `Ready -> Executing`. Returns `false` when the call must not start.
    pub(crate) fn begin(&self) -> bool {
        if self.inner.token.is_cancelled() {
            self.mark_canceled();
            return false;
        }
        self.inner.state.send_if_modified(|state| {
            if *state == CallState::Ready {
                *state = CallState::Executing;
                true
            } else {
                false
            }
        })
    }

    /// `Executing -> Finished`. Returns `false` when the call was canceled,
    /// in which case no completion may be delivered.
    pub(crate) fn finish(&self) -> bool {
        if self.inner.token.is_cancelled() {
            self.mark_canceled();
            return false;
        }
        self.inner.state.send_if_modified(|state| {
            if *state == CallState::Executing {
                *state = CallState::Finished;
                true
            } else {
                false
            }
        })
    }

    /// Records a cancellation that arrived through the parent token.
    pub(crate) fn mark_canceled(&self) {
        self.inner.state.send_if_modified(|state| {
            if state.is_done() {
                false
            } else {
                *state = CallState::Canceled;
                true
            }
        });
    }

    /// Rejected before it could be queued: done, but still owed a completion.
    pub(crate) fn reject(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == CallState::Ready {
                *state = CallState::Finished;
                true
            } else {
                false
            }
        })
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle").field("id", &self.inner.id).field("state", &self.state()).finish()
    }
}

/// Cancels the call when dropped unless disarmed.
pub(crate) struct CancelOnDrop {
    handle: Option<CallHandle>,
}

impl CancelOnDrop {
    pub(crate) fn new(handle: CallHandle) -> Self {
        Self { handle: Some(handle) }
    }

    pub(crate) fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}
