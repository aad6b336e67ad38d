//! Tracing bootstrap
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `SEALPOST_LOG`
//! (falling back to `RUST_LOG`, then to the configured default directive).
//! Set `SEALPOST_LOG_FORMAT=json` for JSON lines.
//!
//! ```no_run
//! sealpost_infra::observability::init_tracing().ok();
//! ```

use sealpost_domain::{Result, SealPostError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter variable consulted first.
pub const LOG_ENV: &str = "SEALPOST_LOG";
/// `json` switches the output format.
pub const LOG_FORMAT_ENV: &str = "SEALPOST_LOG_FORMAT";

/// Output settings for [`init_tracing_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingOptions {
    /// Directive used when neither `SEALPOST_LOG` nor `RUST_LOG` is set.
    pub default_directive: String,
    pub json: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self { default_directive: "info".to_string(), json: false }
    }
}

impl TracingOptions {
    /// Defaults with the output format taken from `SEALPOST_LOG_FORMAT`.
    pub fn from_env() -> Self {
        let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
        Self { json, ..Self::default() }
    }
}

/// Builds the filter: `SEALPOST_LOG`, then `RUST_LOG`, then `default`.
///
/// # Errors
/// Returns `SealPostError::Config` if the default directive does not parse.
pub fn env_filter(default: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| SealPostError::Config(format!("Invalid log filter '{default}': {e}")))
}

/// Installs the global subscriber using [`TracingOptions::from_env`].
///
/// # Errors
/// Returns `SealPostError::Config` if a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    init_tracing_with(&TracingOptions::from_env())
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns `SealPostError::Config` if the filter is invalid or a global
/// subscriber is already set.
pub fn init_tracing_with(options: &TracingOptions) -> Result<()> {
    let filter = env_filter(&options.default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if options.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| SealPostError::Config(format!("Failed to install tracing subscriber: {e}")))?;
    tracing::debug!(json = options.json, "Tracing initialized");
    Ok(())
}
