// crates/run-registry-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Tests
// Description: Validate server, store, and credential constraints.
// Purpose: Ensure registry settings fail closed and enforce limits.
// ============================================================================

//! ## Overview
//! Exercises fail-closed validation of server, store, and credential
//! settings, plus TOML loading with defaults.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions are permitted."
)]

use std::io::Write;

use run_registry_config::ConfigError;
use run_registry_config::DEFAULT_MAX_UPLOAD_BYTES;
use run_registry_config::RegistryConfig;

type TestResult = Result<(), String>;

const MINIMAL_TOML: &str = r#"
[server]
bind = "127.0.0.1:5005"
staging_path = "uploads"

[store]
path = "registry.db"

[auth]
users = [{ username = "operator", password = "hunter2" }]
"#;

fn minimal_config() -> Result<RegistryConfig, ConfigError> {
    toml::from_str::<RegistryConfig>(MINIMAL_TOML).map_err(|err| ConfigError::Parse(err.to_string()))
}

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

#[test]
fn minimal_config_is_valid_with_defaults() -> TestResult {
    let config = minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    assert_eq!(config.server.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    assert_eq!(config.server.allowed_extensions, vec![".gz".to_string(), ".tgz".to_string()]);
    Ok(())
}

#[test]
fn malformed_bind_address_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "not-an-address".to_string();
    assert_invalid(config.validate(), "bind is not a socket address")
}

#[test]
fn zero_upload_ceiling_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.max_upload_bytes = 0;
    assert_invalid(config.validate(), "max_upload_bytes must be greater than zero")
}

#[test]
fn empty_extension_allow_list_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.allowed_extensions.clear();
    assert_invalid(config.validate(), "allowed_extensions must not be empty")
}

#[test]
fn extension_without_leading_dot_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.allowed_extensions = vec!["tgz".to_string()];
    assert_invalid(config.validate(), "must start with a dot")
}

#[test]
fn empty_credential_store_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.auth.users.clear();
    assert_invalid(config.validate(), "at least one credential")
}

#[test]
fn duplicate_usernames_are_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    let duplicate = config.auth.users[0].clone();
    config.auth.users.push(duplicate);
    assert_invalid(config.validate(), "duplicate username")
}

#[test]
fn empty_password_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.auth.users[0].password.clear();
    assert_invalid(config.validate(), "password must not be empty")
}

#[test]
fn zero_read_pool_size_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.store.read_pool_size = 0;
    assert_invalid(config.validate(), "read_pool_size must be greater than zero")
}

#[test]
fn load_reads_and_validates_a_toml_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("registry.toml");
    let mut file = std::fs::File::create(&path).map_err(|err| err.to_string())?;
    file.write_all(MINIMAL_TOML.as_bytes()).map_err(|err| err.to_string())?;
    drop(file);
    let config = RegistryConfig::load(&path).map_err(|err| err.to_string())?;
    assert_eq!(config.auth.users.len(), 1);
    Ok(())
}

#[test]
fn load_of_missing_file_fails_with_io_error() {
    let result = RegistryConfig::load(std::path::Path::new("/nonexistent/registry.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
