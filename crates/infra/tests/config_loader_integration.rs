//! Integration tests for the settings loader
//!
//! Tests the end-to-end behavior of loading settings from files and turning
//! them into a working service.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use sealpost_domain::{ConcurrencyStrategy, SealPostError, TlsMode, UserAgent};
use sealpost_infra::config;
use tempfile::Builder;

mod support;

#[test]
fn test_load_settings_from_json_file() {
    let json_content = r#"{
        "base_url": "https://api.example.com/enrollment-server",
        "timeout_secs": 30,
        "accept_language": "de",
        "user_agent": "library",
        "concurrency": "all_serial",
        "tls_validation": "default",
        "app": { "id": "com.example.bank", "version": "5.2" }
    }"#;

    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("Failed to create temp file");
    temp_file.write_all(json_content.as_bytes()).expect("Failed to write to temp file");

    let settings =
        config::load_from_file(Some(temp_file.path().to_path_buf())).expect("Failed to load JSON settings");
    assert_eq!(settings.concurrency, ConcurrencyStrategy::AllSerial);

    let config = settings.into_config().expect("valid settings");
    assert_eq!(config.base_url().as_str(), "https://api.example.com/enrollment-server");
    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert_eq!(config.accept_language(), "de");
    assert_eq!(config.user_agent(), &UserAgent::LibraryDefault);
    assert_eq!(config.app().map(|a| a.id.as_str()), Some("com.example.bank"));
    assert_eq!(
        config.build_url("/device/register").unwrap().as_str(),
        "https://api.example.com/enrollment-server/device/register"
    );
}

#[test]
fn test_load_settings_from_toml_file() {
    let toml_content = r#"
base_url = "http://localhost:8080"
tls_validation = "no_validation"
accept_plaintext_errors = false
"#;

    let mut temp_file = Builder::new().suffix(".toml").tempfile().expect("Failed to create temp file");
    temp_file.write_all(toml_content.as_bytes()).expect("Failed to write to temp file");

    let settings =
        config::load_from_file(Some(temp_file.path().to_path_buf())).expect("Failed to load TOML settings");
    assert_eq!(settings.tls_validation, TlsMode::NoValidation);
    assert!(!settings.accept_plaintext_errors);
    assert_eq!(settings.timeout_secs, 20);

    let config = settings.into_config().expect("valid settings");
    assert!(config.is_insecure());
}

#[test]
fn test_invalid_settings_are_rejected() {
    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("Failed to create temp file");
    temp_file.write_all(br#"{ "base_url": "not a url" }"#).expect("Failed to write to temp file");

    let settings = config::load_from_file(Some(temp_file.path().to_path_buf())).expect("parses");
    assert!(matches!(settings.into_config(), Err(SealPostError::Config(_))));
}

#[test]
fn test_malformed_file_is_a_config_error() -> anyhow::Result<()> {
    let mut temp_file = Builder::new().suffix(".toml").tempfile()?;
    temp_file.write_all(b"base_url = ")?;

    let err = config::load_from_file(Some(temp_file.path().to_path_buf())).unwrap_err();
    assert!(matches!(err, SealPostError::Config(msg) if msg.contains("TOML")));
    Ok(())
}

#[tokio::test]
async fn test_service_from_loaded_settings() {
    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("Failed to create temp file");
    temp_file
        .write_all(br#"{ "base_url": "https://api.example.com", "concurrency": "all_concurrent" }"#)
        .expect("Failed to write to temp file");

    let settings = config::load_from_file(Some(temp_file.path().to_path_buf())).expect("parses");
    let service = sealpost_infra::connect_from_settings(settings, Arc::new(support::TestSigner::default()))
        .expect("service builds");

    assert_eq!(service.config().concurrency(), ConcurrencyStrategy::AllConcurrent);
    assert_eq!(service.accept_language(), "en");
}
