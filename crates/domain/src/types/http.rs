//! HTTP exchange types shared between the transport and the classifier

/// Authorization header computed by a signing primitive or access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub key: String,
    pub value: String,
}

impl AuthHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Status line and headers of a received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseMetadata {
    pub fn new(status: u16, url: String, headers: Vec<(String, String)>) -> Self {
        Self { status, url, headers }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
