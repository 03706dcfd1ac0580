// crates/run-registry-server/src/auth.rs
// ============================================================================
// Module: Auth Guard
// Description: HTTP Basic credential gate applied in front of every route.
// Purpose: Provide a stateless, fail-closed credential check.
// Dependencies: axum, base64, run-registry-config, subtle
// ============================================================================

//! ## Overview
//! The auth guard verifies HTTP Basic credentials against a configured
//! credential store before any registry operation runs. Verification is
//! side-effect-free and constant-time over the configured credentials, so a
//! request cannot learn which usernames exist from response timing. Failure
//! produces 401 with a `WWW-Authenticate` challenge; no operation is
//! reachable without passing this gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use run_registry_config::AuthConfig;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// One accepted username/password pair.
#[derive(Debug, Clone)]
struct Credential {
    /// Accepted username.
    username: String,
    /// Accepted password.
    password: String,
}

/// Configured credential store for the auth guard.
///
/// # Invariants
/// - Holds no state beyond the configured credentials.
/// - Verification touches every configured credential (constant-time).
#[derive(Debug, Clone)]
pub struct CredentialStore {
    /// Accepted credentials.
    credentials: Vec<Credential>,
}

impl CredentialStore {
    /// Builds a credential store from validated configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            credentials: config
                .users
                .iter()
                .map(|user| Credential {
                    username: user.username.clone(),
                    password: user.password.clone(),
                })
                .collect(),
        }
    }

    /// Verifies a username/password pair against the store.
    ///
    /// Every configured credential is compared so timing does not reveal
    /// which usernames exist.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let mut authorized = false;
        for credential in &self.credentials {
            let user_match = constant_time_eq(credential.username.as_bytes(), username.as_bytes());
            let pass_match = constant_time_eq(credential.password.as_bytes(), password.as_bytes());
            authorized |= user_match && pass_match;
        }
        authorized
    }

    /// Verifies the `Authorization` header of a request.
    ///
    /// Returns `true` only for a well-formed Basic credential matching the
    /// store; malformed or missing headers fail closed.
    #[must_use]
    pub fn verify_headers(&self, headers: &HeaderMap) -> bool {
        let Some((username, password)) = parse_basic_credentials(headers) else {
            return false;
        };
        self.verify(&username, &password)
    }
}

/// Compares two byte strings in constant time for equal lengths.
///
/// Length differences short-circuit; content comparison is constant-time.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len() && left.ct_eq(right).into()
}

// ============================================================================
// SECTION: Header Parsing
// ============================================================================

/// Extracts the username/password pair from a Basic `Authorization` header.
///
/// Returns `None` for missing headers, non-Basic schemes, invalid base64,
/// non-UTF-8 payloads, or payloads without a colon separator.
#[must_use]
pub fn parse_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
