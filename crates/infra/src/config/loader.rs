//! Networking settings loader
//!
//! Loads [`NetworkSettings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SEALPOST_BASE_URL` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SEALPOST_BASE_URL`: Base URL of the backend (required)
//! - `SEALPOST_TIMEOUT_SECS`: Request timeout in seconds
//! - `SEALPOST_ACCEPT_LANGUAGE`: Initial `Accept-Language` value
//! - `SEALPOST_USER_AGENT`: `system`, `library`, or a literal header value
//! - `SEALPOST_CONCURRENCY`: `all_concurrent`, `serial_only_key_signed` or
//!   `all_serial`
//! - `SEALPOST_TLS_VALIDATION`: `default` or `no_validation`
//! - `SEALPOST_ACCEPT_PLAINTEXT_ERRORS`: Whether plain error envelopes are
//!   accepted for encrypted calls (true/false)
//! - `SEALPOST_APP_ID` / `SEALPOST_APP_VERSION`: Application identity used in
//!   the library User-Agent
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./sealpost.json` or `./sealpost.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../sealpost.json` or `../sealpost.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};

use sealpost_domain::{
    AppIdentity, ConcurrencyStrategy, NetworkConfig, NetworkSettings, Result, SealPostError, TlsMode,
};

/// Load settings with automatic fallback strategy
///
/// First attempts to load from environment variables. If the base URL is
/// not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `SealPostError::Config` if:
/// - Settings cannot be loaded from either source
/// - File format is invalid
/// - An environment variable has an invalid value
pub fn load() -> Result<NetworkSettings> {
    if std::env::var_os(ENV_BASE_URL).is_none() {
        tracing::debug!("{ENV_BASE_URL} not set, trying file");
        return load_from_file(None);
    }

    let settings = load_from_env()?;
    tracing::info!("Networking settings loaded from environment variables");
    Ok(settings)
}

/// Load settings and validate them into a [`NetworkConfig`].
///
/// # Errors
/// Returns `SealPostError::Config` if loading fails or the settings are
/// invalid (see [`NetworkSettings::into_config`]).
pub fn load_config() -> Result<NetworkConfig> {
    load()?.into_config()
}

const ENV_BASE_URL: &str = "SEALPOST_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "SEALPOST_TIMEOUT_SECS";
const ENV_ACCEPT_LANGUAGE: &str = "SEALPOST_ACCEPT_LANGUAGE";
const ENV_USER_AGENT: &str = "SEALPOST_USER_AGENT";
const ENV_CONCURRENCY: &str = "SEALPOST_CONCURRENCY";
const ENV_TLS_VALIDATION: &str = "SEALPOST_TLS_VALIDATION";
const ENV_ACCEPT_PLAINTEXT_ERRORS: &str = "SEALPOST_ACCEPT_PLAINTEXT_ERRORS";
const ENV_APP_ID: &str = "SEALPOST_APP_ID";
const ENV_APP_VERSION: &str = "SEALPOST_APP_VERSION";

/// Load settings from environment variables
///
/// Only `SEALPOST_BASE_URL` is required; everything else falls back to the
/// [`NetworkSettings`] defaults.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `SealPostError::Config` if the base URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> Result<NetworkSettings> {
    let mut settings = NetworkSettings::new(env_var(ENV_BASE_URL)?);

    if let Some(timeout) = optional_env(ENV_TIMEOUT_SECS) {
        settings.timeout_secs = timeout
            .parse::<u64>()
            .map_err(|e| SealPostError::Config(format!("Invalid timeout: {}", e)))?;
    }
    if let Some(language) = optional_env(ENV_ACCEPT_LANGUAGE) {
        settings.accept_language = language;
    }
    settings.user_agent = optional_env(ENV_USER_AGENT);
    if let Some(concurrency) = optional_env(ENV_CONCURRENCY) {
        settings.concurrency = concurrency.parse::<ConcurrencyStrategy>()?;
    }
    if let Some(tls) = optional_env(ENV_TLS_VALIDATION) {
        settings.tls_validation = tls.parse::<TlsMode>()?;
    }
    settings.accept_plaintext_errors = env_bool(ENV_ACCEPT_PLAINTEXT_ERRORS, true);

    settings.app = match (optional_env(ENV_APP_ID), optional_env(ENV_APP_VERSION)) {
        (Some(id), Some(version)) => Some(AppIdentity { id, version }),
        (Some(id), None) => Some(AppIdentity { id, version: "??".to_string() }),
        (None, _) => None,
    };

    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `SealPostError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<NetworkSettings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SealPostError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SealPostError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading networking settings from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SealPostError::Config(format!("Failed to read config file: {}", e)))?;

    parse_settings(&contents, &config_path)
}

/// Parse settings from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_settings(contents: &str, path: &Path) -> Result<NetworkSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SealPostError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SealPostError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(SealPostError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
        candidates.push(cwd.join("../sealpost.json"));
        candidates.push(cwd.join("../sealpost.toml"));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> [PathBuf; 4] {
    [
        dir.join("sealpost.json"),
        dir.join("sealpost.toml"),
        dir.join("config.json"),
        dir.join("config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `SealPostError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SealPostError::Config(format!("Missing required environment variable: {}", key)))
}

/// Optional environment variable; empty values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
