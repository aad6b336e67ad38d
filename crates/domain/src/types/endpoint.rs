//! Endpoint descriptors
//!
//! An endpoint is a relative path plus the authentication it requires. The
//! descriptors are immutable and usually declared as `const` items next to
//! the payload types they carry.

use std::borrow::Cow;

/// Authentication an endpoint requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// No signature header.
    Unsigned,
    /// Signed by the credential's key over `{method, uri_id, body}`.
    SignedByKey { uri_id: Cow<'static, str> },
    /// Authorized with a named access token.
    SignedByToken { token_name: Cow<'static, str> },
}

impl AuthMode {
    pub fn is_signed(&self) -> bool {
        !matches!(self, Self::Unsigned)
    }
}

/// Path and authentication requirement of a backend endpoint.
///
/// ```rust
/// use sealpost_domain::EndpointDescriptor;
///
/// const CONFIRM: EndpointDescriptor =
///     EndpointDescriptor::signed("/api/operation/confirm", "/operation/authorize");
///
/// assert!(CONFIRM.requires_key_signature());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    path: Cow<'static, str>,
    auth: AuthMode,
}

impl EndpointDescriptor {
    pub const fn unsigned(path: &'static str) -> Self {
        Self { path: Cow::Borrowed(path), auth: AuthMode::Unsigned }
    }

    pub const fn signed(path: &'static str, uri_id: &'static str) -> Self {
        Self { path: Cow::Borrowed(path), auth: AuthMode::SignedByKey { uri_id: Cow::Borrowed(uri_id) } }
    }

    pub const fn signed_with_token(path: &'static str, token_name: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
            auth: AuthMode::SignedByToken { token_name: Cow::Borrowed(token_name) },
        }
    }

    /// Descriptor built at runtime, e.g. from configuration.
    pub fn new(path: impl Into<String>, auth: AuthMode) -> Self {
        Self { path: Cow::Owned(path.into()), auth }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    pub fn uri_id(&self) -> Option<&str> {
        match &self.auth {
            AuthMode::SignedByKey { uri_id } => Some(uri_id.as_ref()),
            _ => None,
        }
    }

    pub fn token_name(&self) -> Option<&str> {
        match &self.auth {
            AuthMode::SignedByToken { token_name } => Some(token_name.as_ref()),
            _ => None,
        }
    }

    pub fn requires_key_signature(&self) -> bool {
        matches!(self.auth, AuthMode::SignedByKey { .. })
    }

    pub fn requires_token(&self) -> bool {
        matches!(self.auth, AuthMode::SignedByToken { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING: EndpointDescriptor = EndpointDescriptor::unsigned("/ping");
    const CONFIRM: EndpointDescriptor = EndpointDescriptor::signed("/operation/confirm", "/operation/authorize");
    const LIST: EndpointDescriptor = EndpointDescriptor::signed_with_token("/operation/list", "possession_universal");

    #[test]
    fn const_descriptors_expose_auth() {
        assert!(!PING.auth().is_signed());
        assert_eq!(CONFIRM.uri_id(), Some("/operation/authorize"));
        assert!(CONFIRM.requires_key_signature());
        assert_eq!(LIST.token_name(), Some("possession_universal"));
        assert!(LIST.requires_token());
        assert!(!LIST.requires_key_signature());
    }

    #[test]
    fn runtime_descriptor_matches_const_one() {
        let built = EndpointDescriptor::new(
            "/operation/confirm",
            AuthMode::SignedByKey { uri_id: "/operation/authorize".into() },
        );
        assert_eq!(built, CONFIRM);
    }

    #[test]
    fn descriptors_are_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<EndpointDescriptor>();
    }
}
