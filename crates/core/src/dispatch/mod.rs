//! Dispatch coordinator
//!
//! [`NetworkingService`] owns the call pipeline; [`CallHandle`] observes and
//! cancels single calls; completion contexts decide where results are
//! delivered.

pub mod context;
pub mod handle;
mod lane;
pub mod options;
pub mod service;

pub use context::{ChannelContext, CompletionQueue, RuntimeContext, WorkerContext};
pub use handle::{CallHandle, CallState};
pub use options::PostOptions;
pub use service::{NetworkingService, NetworkingServiceBuilder};
