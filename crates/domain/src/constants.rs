//! Wire-level constants
//!
//! Header names, content types and defaults shared by every SealPost crate.

// Envelope keys
pub const REQUEST_OBJECT_KEY: &str = "requestObject";
pub const RESPONSE_OBJECT_KEY: &str = "responseObject";
pub const RESPONSE_ERROR_KEY: &str = "responseError";

// HTTP
pub const HTTP_METHOD_POST: &str = "POST";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_ACCEPT_LANGUAGE: &str = "Accept-Language";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HTTP_STATUS_OK: u16 = 200;

// Defaults
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

// Library identity (used by the composite User-Agent)
pub const LIBRARY_PRODUCT_NAME: &str = "SealPost";
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
