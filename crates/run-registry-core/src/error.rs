// crates/run-registry-core/src/error.rs
// ============================================================================
// Module: Registry Error Taxonomy
// Description: Service-level error kinds for registry operations.
// Purpose: Give callers stable kinds to branch on instead of generic faults.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The service layer reports failures as explicit [`RegistryError`] kinds.
//! The split between "could not be performed" (client errors: validation,
//! conflicts, missing records, bad credentials) and "failed unexpectedly"
//! (storage faults) is part of the contract; the HTTP surface maps it onto
//! 4xx versus 5xx status codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::store::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry operation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Storage causes are carried, never swallowed.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Missing or invalid request credentials.
    #[error("unauthenticated request")]
    Unauthenticated,
    /// Missing required field or disallowed value.
    #[error("validation error: {0}")]
    Validation(String),
    /// Another upload with the same filename is in flight.
    #[error("staging conflict: {0}")]
    StagingConflict(String),
    /// No record or blob exists for the requested key.
    #[error("not found: {0}")]
    NotFound(String),
    /// Atomic write aborted; the underlying cause is attached.
    #[error("write failed: {0}")]
    WriteFailed(#[source] StoreError),
    /// Read query failed; the underlying cause is attached.
    #[error("query failed: {0}")]
    QueryFailed(#[source] StoreError),
}

impl RegistryError {
    /// Returns true when the failure is attributable to the request.
    ///
    /// Client errors map to 4xx-equivalent statuses; everything else is an
    /// unexpected failure and maps to a 5xx-equivalent status.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Unauthenticated
            | Self::Validation(_)
            | Self::StagingConflict(_)
            | Self::NotFound(_) => true,
            Self::WriteFailed(cause) => matches!(cause, StoreError::Conflict(_)),
            Self::QueryFailed(_) => false,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::RegistryError;
    use crate::store::StoreError;

    #[test]
    fn validation_and_conflict_kinds_are_client_errors() {
        assert!(RegistryError::Unauthenticated.is_client_error());
        assert!(RegistryError::Validation("missing field".to_string()).is_client_error());
        assert!(RegistryError::StagingConflict("upload.tgz".to_string()).is_client_error());
        assert!(RegistryError::NotFound("run 9".to_string()).is_client_error());
    }

    #[test]
    fn duplicate_run_write_is_a_client_error() {
        let error = RegistryError::WriteFailed(StoreError::Conflict("run 4".to_string()));
        assert!(error.is_client_error());
    }

    #[test]
    fn storage_faults_are_not_client_errors() {
        let write = RegistryError::WriteFailed(StoreError::Db("disk full".to_string()));
        let query = RegistryError::QueryFailed(StoreError::Db("io".to_string()));
        assert!(!write.is_client_error());
        assert!(!query.is_client_error());
    }
}
