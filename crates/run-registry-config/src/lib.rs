// crates/run-registry-config/src/lib.rs
// ============================================================================
// Module: Run Registry Configuration
// Description: Canonical configuration model loaded from TOML.
// Purpose: Validate server, store, and credential settings fail-closed.
// Dependencies: run-registry-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration for the run registry service. A single TOML document
//! carries the HTTP server settings (bind address, upload ceiling, extension
//! allow-list, staging path), the SQLite store settings, and the credential
//! store for the auth guard. Loading validates everything before the service
//! starts; invalid configuration never reaches the runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use run_registry_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum upload size in bytes (32 MB, reference deployment).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1000 * 1000;

/// Default allowed upload extensions.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 2] = [".gz", ".tgz"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed credential material.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Configuration failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Model
// ============================================================================

/// Top-level registry configuration.
///
/// # Invariants
/// - `validate` has been called before the configuration is used.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// SQLite store settings.
    pub store: SqliteStoreConfig,
    /// Credential store for the auth guard.
    pub auth: AuthConfig,
}

/// HTTP server settings.
///
/// # Invariants
/// - `bind` parses as a socket address.
/// - `max_upload_bytes` is greater than zero.
/// - `allowed_extensions` is non-empty; each entry starts with a dot.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Allowed upload filename extensions.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Directory holding staging slots for in-flight uploads.
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,
}

/// Credential store configuration.
///
/// # Invariants
/// - `users` is non-empty with unique, non-empty usernames.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Accepted Basic credentials.
    pub users: Vec<CredentialConfig>,
}

/// One accepted username/password pair.
///
/// # Invariants
/// - Neither field is empty after validation.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    /// Username presented in the Basic credential.
    pub username: String,
    /// Password presented in the Basic credential.
    pub password: String,
}

/// Returns the default bind address.
fn default_bind() -> String {
    "127.0.0.1:5005".to_string()
}

/// Returns the default maximum upload size.
const fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Returns the default extension allow-list.
fn default_allowed_extensions() -> Vec<String> {
    DEFAULT_ALLOWED_EXTENSIONS.iter().map(ToString::to_string).collect()
}

/// Returns the default staging directory.
fn default_staging_path() -> PathBuf {
    PathBuf::from("uploads")
}

// ============================================================================
// SECTION: Loading & Validation
// ============================================================================

impl RegistryConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or
    /// when validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration fail-closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        validate_store(&self.store)
    }
}

impl ServerConfig {
    /// Validates server settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a constraint is violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind.parse::<SocketAddr>().map_err(|_| {
            ConfigError::Invalid(format!("bind is not a socket address: {}", self.bind))
        })?;
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_extensions must not be empty".to_string(),
            ));
        }
        for extension in &self.allowed_extensions {
            if !extension.starts_with('.') || extension.len() < 2 {
                return Err(ConfigError::Invalid(format!(
                    "allowed extension must start with a dot: {extension}"
                )));
            }
        }
        if self.staging_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("staging_path must not be empty".to_string()));
        }
        Ok(())
    }
}

impl AuthConfig {
    /// Validates the credential store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a constraint is violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.users must contain at least one credential".to_string(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(ConfigError::Invalid("username must not be empty".to_string()));
            }
            if user.password.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "password must not be empty for user {}",
                    user.username
                )));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate username: {}",
                    user.username
                )));
            }
        }
        Ok(())
    }
}

/// Validates store settings the service relies on.
fn validate_store(store: &SqliteStoreConfig) -> Result<(), ConfigError> {
    if store.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("store.path must not be empty".to_string()));
    }
    if store.read_pool_size == 0 {
        return Err(ConfigError::Invalid(
            "store.read_pool_size must be greater than zero".to_string(),
        ));
    }
    if store.max_blob_bytes == 0 {
        return Err(ConfigError::Invalid(
            "store.max_blob_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
