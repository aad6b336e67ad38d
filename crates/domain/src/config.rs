//! Networking configuration
//!
//! [`NetworkConfig`] is the immutable configuration a networking service is
//! created with. [`NetworkSettings`] is its serde-loadable subset, read from
//! the environment or a config file by the infra loader.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{DEFAULT_ACCEPT_LANGUAGE, DEFAULT_TIMEOUT_SECS, LIBRARY_PRODUCT_NAME, LIBRARY_VERSION};
use crate::errors::{Result, SealPostError};
use crate::impl_setting_conversions;

// ============================================================================
// TLS validation
// ============================================================================

/// Decides whether a presented certificate chain is trusted.
///
/// Called during the TLS handshake before the standard chain validation.
/// Certificates are DER encoded.
pub trait PinningProvider: Send + Sync + fmt::Debug {
    fn validate(&self, server_name: &str, end_entity: &[u8], intermediates: &[&[u8]]) -> bool;
}

/// How the transport validates server certificates.
#[derive(Debug, Clone, Default)]
pub enum TlsValidation {
    /// Platform trust roots.
    #[default]
    Default,
    /// Accept any certificate. Development only.
    NoValidation,
    /// Consult the provider, then validate against the trust roots.
    Pinning(Arc<dyn PinningProvider>),
}

impl TlsValidation {
    pub fn mode(&self) -> TlsMode {
        match self {
            Self::Default | Self::Pinning(_) => TlsMode::Default,
            Self::NoValidation => TlsMode::NoValidation,
        }
    }
}

/// Loadable subset of [`TlsValidation`]. Pinning is only available in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    #[default]
    Default,
    NoValidation,
}

impl_setting_conversions!(TlsMode {
    Default => "default",
    NoValidation => "no_validation",
});

impl From<TlsMode> for TlsValidation {
    fn from(mode: TlsMode) -> Self {
        match mode {
            TlsMode::Default => Self::Default,
            TlsMode::NoValidation => Self::NoValidation,
        }
    }
}

// ============================================================================
// Concurrency and User-Agent
// ============================================================================

/// Which calls go through the per-credential serial lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyStrategy {
    /// Every call runs concurrently.
    AllConcurrent,
    /// Only key-signed calls are serialized.
    #[default]
    SerialOnlyKeySigned,
    /// Every call is serialized.
    AllSerial,
}

impl_setting_conversions!(ConcurrencyStrategy {
    AllConcurrent => "all_concurrent",
    SerialOnlyKeySigned => "serial_only_key_signed",
    AllSerial => "all_serial",
});

/// Application identity reported in the library User-Agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub id: String,
    pub version: String,
}

/// User-Agent header policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserAgent {
    /// Leave the header to the transport.
    SystemDefault,
    /// `SealPost/<version> (<language>) <app id>/<app version> (<os>; <arch>)`.
    #[default]
    LibraryDefault,
    Custom(String),
}

impl UserAgent {
    /// Parses a setting value: `system`, `library`, or a literal header value.
    pub fn from_setting(value: &str) -> Self {
        match value.trim() {
            v if v.eq_ignore_ascii_case("system") => Self::SystemDefault,
            v if v.eq_ignore_ascii_case("library") => Self::LibraryDefault,
            v => Self::Custom(v.to_string()),
        }
    }

    pub fn header_value(&self, language: &str, app: Option<&AppIdentity>) -> Option<String> {
        match self {
            Self::SystemDefault => None,
            Self::Custom(value) => Some(value.clone()),
            Self::LibraryDefault => {
                let (app_id, app_version) =
                    app.map_or(("??", ""), |app| (app.id.as_str(), app.version.as_str()));
                Some(format!(
                    "{LIBRARY_PRODUCT_NAME}/{LIBRARY_VERSION} ({language}) {app_id}/{app_version} ({}; {})",
                    std::env::consts::OS,
                    std::env::consts::ARCH,
                ))
            }
        }
    }
}

// ============================================================================
// NetworkConfig
// ============================================================================

/// Immutable configuration of a networking service.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    base_url: Url,
    tls_validation: TlsValidation,
    timeout: Duration,
    user_agent: UserAgent,
    accept_language: String,
    concurrency: ConcurrencyStrategy,
    accept_plaintext_errors: bool,
    app: Option<AppIdentity>,
}

impl NetworkConfig {
    pub fn new(base_url: Url) -> Self {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: Url) -> NetworkConfigBuilder {
        NetworkConfigBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tls_validation(&self) -> &TlsValidation {
        &self.tls_validation
    }

    /// Default per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    pub fn accept_language(&self) -> &str {
        &self.accept_language
    }

    pub fn concurrency(&self) -> ConcurrencyStrategy {
        self.concurrency
    }

    /// Whether a plaintext `ERROR` envelope is accepted when decrypting an
    /// encrypted response fails.
    pub fn accept_plaintext_errors(&self) -> bool {
        self.accept_plaintext_errors
    }

    pub fn app(&self) -> Option<&AppIdentity> {
        self.app.as_ref()
    }

    /// Plain `http://` base URL.
    pub fn is_insecure(&self) -> bool {
        self.base_url.scheme() == "http"
    }

    /// Joins the base URL and an endpoint path. A single leading `/` of
    /// `path` is dropped so the base URL's own path is kept.
    pub fn build_url(&self, path: &str) -> std::result::Result<Url, url::ParseError> {
        let relative = path.strip_prefix('/').unwrap_or(path);
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{relative}"))
    }

    /// User-Agent header for the given Accept-Language, if any.
    pub fn user_agent_header(&self, language: &str) -> Option<String> {
        self.user_agent.header_value(language, self.app.as_ref())
    }
}

/// Builder for [`NetworkConfig`].
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    config: NetworkConfig,
}

impl NetworkConfigBuilder {
    fn new(base_url: Url) -> Self {
        Self {
            config: NetworkConfig {
                base_url,
                tls_validation: TlsValidation::Default,
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                user_agent: UserAgent::default(),
                accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
                concurrency: ConcurrencyStrategy::default(),
                accept_plaintext_errors: true,
                app: None,
            },
        }
    }

    #[must_use]
    pub fn tls_validation(mut self, tls_validation: TlsValidation) -> Self {
        self.config.tls_validation = tls_validation;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: UserAgent) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    #[must_use]
    pub fn accept_language(mut self, language: impl Into<String>) -> Self {
        self.config.accept_language = language.into();
        self
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: ConcurrencyStrategy) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn accept_plaintext_errors(mut self, accept: bool) -> Self {
        self.config.accept_plaintext_errors = accept;
        self
    }

    #[must_use]
    pub fn app_identity(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.app = Some(AppIdentity { id: id.into(), version: version.into() });
        self
    }

    pub fn build(self) -> NetworkConfig {
        self.config
    }
}

// ============================================================================
// NetworkSettings
// ============================================================================

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

const fn default_true() -> bool {
    true
}

/// Serializable networking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// `system`, `library`, or a literal header value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub concurrency: ConcurrencyStrategy,
    #[serde(default)]
    pub tls_validation: TlsMode,
    #[serde(default = "default_true")]
    pub accept_plaintext_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppIdentity>,
}

impl NetworkSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            user_agent: None,
            concurrency: ConcurrencyStrategy::default(),
            tls_validation: TlsMode::default(),
            accept_plaintext_errors: true,
            app: None,
        }
    }

    /// Validates the settings and builds a [`NetworkConfig`].
    ///
    /// # Errors
    /// Returns `SealPostError::Config` for an unparseable base URL or a zero
    /// timeout.
    pub fn into_config(self) -> Result<NetworkConfig> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| SealPostError::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        if self.timeout_secs == 0 {
            return Err(SealPostError::Config("Timeout must be greater than zero".to_string()));
        }

        let mut builder = NetworkConfig::builder(base_url)
            .tls_validation(self.tls_validation.into())
            .timeout(Duration::from_secs(self.timeout_secs))
            .accept_language(self.accept_language)
            .concurrency(self.concurrency)
            .accept_plaintext_errors(self.accept_plaintext_errors);
        if let Some(user_agent) = self.user_agent.as_deref() {
            builder = builder.user_agent(UserAgent::from_setting(user_agent));
        }
        if let Some(app) = self.app {
            builder = builder.app_identity(app.id, app.version);
        }
        Ok(builder.build())
    }
}
