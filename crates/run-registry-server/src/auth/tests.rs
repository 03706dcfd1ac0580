// crates/run-registry-server/src/auth/tests.rs
// ============================================================================
// Module: Auth Guard Unit Tests
// Description: Unit tests for Basic header parsing and credential checks.
// Purpose: Validate the fail-closed behavior of the auth guard.
// Dependencies: run-registry-server
// ============================================================================

//! ## Overview
//! Exercises Basic credential parsing and constant-time verification with
//! in-memory fixtures.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions."
)]

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use run_registry_config::AuthConfig;
use run_registry_config::CredentialConfig;

use super::CredentialStore;
use super::parse_basic_credentials;

fn store() -> CredentialStore {
    CredentialStore::from_config(&AuthConfig {
        users: vec![
            CredentialConfig {
                username: "operator".to_string(),
                password: "hunter2".to_string(),
            },
            CredentialConfig {
                username: "shifter".to_string(),
                password: "np04".to_string(),
            },
        ],
    })
}

fn basic_header(username: &str, password: &str) -> HeaderMap {
    let encoded = BASE64.encode(format!("{username}:{password}"));
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value"),
    );
    headers
}

#[test]
fn valid_credentials_are_accepted() {
    assert!(store().verify_headers(&basic_header("operator", "hunter2")));
    assert!(store().verify_headers(&basic_header("shifter", "np04")));
}

#[test]
fn wrong_password_is_rejected() {
    assert!(!store().verify_headers(&basic_header("operator", "wrong")));
}

#[test]
fn unknown_user_is_rejected() {
    assert!(!store().verify_headers(&basic_header("intruder", "hunter2")));
}

#[test]
fn crossed_credentials_are_rejected() {
    assert!(!store().verify_headers(&basic_header("operator", "np04")));
}

#[test]
fn missing_header_fails_closed() {
    assert!(!store().verify_headers(&HeaderMap::new()));
}

#[test]
fn non_basic_scheme_fails_closed() {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token"));
    assert!(!store().verify_headers(&headers));
    assert!(parse_basic_credentials(&headers).is_none());
}

#[test]
fn invalid_base64_fails_closed() {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic ???not-base64???"));
    assert!(parse_basic_credentials(&headers).is_none());
}

#[test]
fn payload_without_colon_fails_closed() {
    let encoded = BASE64.encode("no-separator");
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value"),
    );
    assert!(parse_basic_credentials(&headers).is_none());
}

#[test]
fn password_may_contain_colons() {
    let headers = basic_header("operator", "a:b:c");
    let (username, password) = parse_basic_credentials(&headers).expect("credentials");
    assert_eq!(username, "operator");
    assert_eq!(password, "a:b:c");
}
