//! # SealPost Core
//!
//! Request dispatch and signing coordination - no HTTP code.
//!
//! This crate contains:
//! - Port interfaces (signing primitive, credential, encryptor, transport,
//!   completion context, response observer)
//! - Request builder and response classifier
//! - Signing coordinator and access token cache
//! - Dispatch coordinator with per-credential serial lanes
//!
//! ## Architecture Principles
//! - Only depends on `sealpost-domain`
//! - All I/O goes through the [`ports::Transport`] trait

pub mod classify;
pub mod dispatch;
pub mod ports;
pub mod request;
pub mod signing;
pub mod token_store;

#[cfg(test)]
mod test_support;

pub use classify::{process_response, resolve, ProcessedResponse, ResponseClassifier};
pub use dispatch::{
    CallHandle, CallState, ChannelContext, CompletionQueue, NetworkingService, NetworkingServiceBuilder,
    PostOptions, RuntimeContext, WorkerContext,
};
pub use ports::{
    AccessToken, CompletionContext, Credential, Encryptor, Job, ProgressCallback, ResponseObserver,
    SigningPrimitive, Transport, TransportResponse,
};
pub use request::{OutgoingRequest, RequestBuilder, RequestHeaders};
pub use signing::SigningCoordinator;
pub use token_store::TokenStore;
