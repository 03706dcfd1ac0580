// crates/run-registry-server/src/staging.rs
// ============================================================================
// Module: Upload Staging
// Description: Exclusive staging slots for in-flight artifact uploads.
// Purpose: Validate uploads and serialize same-filename writers safely.
// Dependencies: run-registry-core, thiserror
// ============================================================================

//! ## Overview
//! Uploaded artifacts are staged on disk before the atomic store write. The
//! staging area is a shared namespace keyed by filename: reservation uses an
//! exclusive create-if-absent (`OpenOptions::create_new`), so two concurrent
//! uploads of the same filename cannot corrupt each other; the second
//! observes a conflict. A separate existence check followed by a create
//! would race and is deliberately absent.
//!
//! The returned artifact carries an RAII guard; dropping it releases the
//! slot on every exit path (success, validation failure, or write failure),
//! so retries are always possible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upload staging errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Filename extension is not in the configured allow-list.
    #[error("disallowed upload extension: {0} (expected one of {1})")]
    InvalidExtension(String, String),
    /// Required upload field is absent.
    #[error("missing upload field: {0}")]
    MissingField(String),
    /// Another upload with the same filename holds the staging slot.
    #[error("staging slot busy for filename: {0}")]
    Conflict(String),
    /// Upload exceeds the configured size ceiling.
    #[error("upload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual upload size in bytes.
        actual_bytes: usize,
    },
    /// Staging I/O failure.
    #[error("staging io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Staging Area
// ============================================================================

/// Shared staging namespace for in-flight uploads.
///
/// # Invariants
/// - At most one slot exists per filename at any time.
/// - Slot reservation is a single atomic create-if-absent action.
#[derive(Debug)]
pub struct StagingArea {
    /// Directory holding staging slots.
    root: PathBuf,
    /// Allowed filename extensions (each starting with a dot).
    allowed_extensions: Vec<String>,
    /// Maximum accepted upload size in bytes.
    max_bytes: usize,
}

/// Staged artifact: the uploaded bytes plus the slot release guard.
#[derive(Debug)]
pub struct StagedArtifact {
    /// Uploaded bytes read back from the staging slot.
    pub bytes: Vec<u8>,
    /// Slot guard; dropping it releases the filename.
    pub slot: StagingSlot,
}

/// Exclusive reservation of one staging filename.
///
/// # Invariants
/// - The slot file exists for exactly the lifetime of this guard.
#[derive(Debug)]
pub struct StagingSlot {
    /// Path of the reserved slot file.
    path: PathBuf,
}

impl Drop for StagingSlot {
    fn drop(&mut self) {
        // Release on every exit path; a vanished file is already released.
        let _ = fs::remove_file(&self.path);
    }
}

impl StagingArea {
    /// Creates a staging area rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] when the staging directory cannot be
    /// created.
    pub fn new(
        root: PathBuf,
        allowed_extensions: Vec<String>,
        max_bytes: usize,
    ) -> Result<Self, StagingError> {
        fs::create_dir_all(&root).map_err(|err| StagingError::Io(err.to_string()))?;
        Ok(Self {
            root,
            allowed_extensions,
            max_bytes,
        })
    }

    /// Validates and stages an uploaded artifact.
    ///
    /// Reserves the exclusive slot for `filename`, persists the bytes into
    /// it, and reads them back into memory. The returned guard releases the
    /// slot when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError`] when validation fails, the slot is already
    /// held, or staging I/O fails.
    pub fn stage(&self, filename: &str, bytes: &[u8]) -> Result<StagedArtifact, StagingError> {
        self.validate_filename(filename)?;
        if bytes.len() > self.max_bytes {
            return Err(StagingError::TooLarge {
                max_bytes: self.max_bytes,
                actual_bytes: bytes.len(),
            });
        }
        let path = self.root.join(filename);
        let slot = reserve_slot(path, filename)?;
        let staged = write_and_read_back(&slot, bytes);
        match staged {
            Ok(buffer) => Ok(StagedArtifact {
                bytes: buffer,
                slot,
            }),
            // The guard releases the slot when `slot` drops here.
            Err(err) => Err(err),
        }
    }

    /// Validates the uploaded filename against the allow-list.
    fn validate_filename(&self, filename: &str) -> Result<(), StagingError> {
        if filename.is_empty() {
            return Err(StagingError::MissingField("file".to_string()));
        }
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(StagingError::Io(format!(
                "filename must not contain path components: {filename}"
            )));
        }
        let allowed = self
            .allowed_extensions
            .iter()
            .any(|extension| filename.len() > extension.len() && filename.ends_with(extension));
        if allowed {
            Ok(())
        } else {
            Err(StagingError::InvalidExtension(
                filename.to_string(),
                self.allowed_extensions.join(", "),
            ))
        }
    }
}

/// Reserves the slot file with an atomic exclusive create.
fn reserve_slot(path: PathBuf, filename: &str) -> Result<StagingSlot, StagingError> {
    let created = OpenOptions::new().write(true).create_new(true).open(&path);
    match created {
        Ok(file) => {
            drop(file);
            Ok(StagingSlot {
                path,
            })
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            Err(StagingError::Conflict(filename.to_string()))
        }
        Err(err) => Err(StagingError::Io(err.to_string())),
    }
}

/// Persists the uploaded bytes into the slot and reads them back.
fn write_and_read_back(slot: &StagingSlot, bytes: &[u8]) -> Result<Vec<u8>, StagingError> {
    write_slot(&slot.path, bytes).map_err(|err| StagingError::Io(err.to_string()))?;
    read_slot(&slot.path).map_err(|err| StagingError::Io(err.to_string()))
}

/// Writes the uploaded bytes into the slot file.
fn write_slot(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Reads the slot file back into an in-memory buffer.
fn read_slot(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
