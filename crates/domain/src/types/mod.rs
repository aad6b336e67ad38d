//! Wire and exchange types

pub mod crypto;
pub mod endpoint;
pub mod envelope;
pub mod http;

pub use crypto::{Cryptogram, EncryptedRequest, EncryptedResponse, EncryptionMetadata};
pub use endpoint::{AuthMode, EndpointDescriptor};
pub use envelope::{
    ApiError, KnownApiError, RequestEnvelope, ResponseEnvelope, ResponseStatus, UnknownApiErrorCode,
};
pub use http::{AuthHeader, ResponseMetadata};
