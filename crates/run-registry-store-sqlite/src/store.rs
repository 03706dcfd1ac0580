// crates/run-registry-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Registry Store
// Description: Durable RegistryStore backed by SQLite WAL.
// Purpose: Atomic record+blob ingestion and parameterized read queries.
// Dependencies: run-registry-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`RegistryStore`] using SQLite. The
//! ingestion path executes exactly two statements (metadata insert, blob
//! insert) inside a single transaction, so a partial write cannot be
//! observed. Run numbers carry a primary-key constraint; a second insert
//! for the same run number fails with a conflict instead of mutating the
//! existing row. Reads go through a round-robin pool of connections so they
//! never contend with the write path beyond ordinary SQLite locking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use run_registry_core::NewRun;
use run_registry_core::RegistryStore;
use run_registry_core::RunBlob;
use run_registry_core::RunNumber;
use run_registry_core::RunRecord;
use run_registry_core::StoreError;
use run_registry_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLite schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default maximum blob payload accepted by the store.
pub const DEFAULT_MAX_BLOB_BYTES: usize = 32 * 1000 * 1000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// SQLite journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to SQLite `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to SQLite `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the SQLite registry store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` and `max_blob_bytes` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// SQLite sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
    /// Maximum blob payload size in bytes.
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: usize,
}

/// Returns the default busy timeout for SQLite connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Returns the default blob size ceiling.
const fn default_max_blob_bytes() -> usize {
    DEFAULT_MAX_BLOB_BYTES
}

/// Validates runtime limits in the store configuration.
fn validate_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if config.read_pool_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "read_pool_size must be greater than zero".to_string(),
        ));
    }
    if config.max_blob_bytes == 0 {
        return Err(SqliteStoreError::Invalid(
            "max_blob_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw blob payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Uniqueness conflict on the run number key.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Blob payload exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::TooLarge {
                max_bytes,
                actual_bytes,
            },
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed registry store with WAL support.
///
/// # Invariants
/// - Record and blob inserts share a single transaction scope.
/// - Write access is serialized through a mutex; reads round-robin over a
///   dedicated connection pool.
#[derive(Clone)]
pub struct SqliteRegistryStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteRegistryStore {
    /// Opens an SQLite-backed registry store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        validate_limits(&config)?;
        let mut write_connection = open_connection(&config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(&config)?));
        }
        Ok(Self {
            config,
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }

    /// Locks a read connection, surfacing poisoning as a store error.
    fn lock_read(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.read_connection()
            .lock()
            .map_err(|_| SqliteStoreError::Db("sqlite read mutex poisoned".to_string()))
    }

    /// Locks the write connection, surfacing poisoning as a store error.
    fn lock_write(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("sqlite write mutex poisoned".to_string()))
    }

    /// Inserts the metadata row and blob row inside one transaction.
    fn insert_run_atomic(&self, run: &NewRun, blob_bytes: &[u8]) -> Result<(), SqliteStoreError> {
        if blob_bytes.len() > self.config.max_blob_bytes {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: self.config.max_blob_bytes,
                actual_bytes: blob_bytes.len(),
            });
        }
        let run_num = encode_run_number(run.run_number)?;
        let mut guard = self.lock_write()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        execute_insert(
            &tx,
            "INSERT INTO run_registry_meta (run_num, det_id, run_type, software_version, \
             filename, start_time, stop_time) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![
                run_num,
                run.det_id.as_str(),
                run.run_type.as_str(),
                run.software_version.as_str(),
                run.filename.as_str(),
                run.start_time.as_millis()
            ],
            run.run_number,
        )?;
        execute_insert(
            &tx,
            "INSERT INTO run_registry_blob (run_num, filename, config_blob) VALUES (?1, ?2, ?3)",
            params![run_num, run.filename.as_str(), blob_bytes],
            run.run_number,
        )?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Fetches the metadata row for a run number.
    fn fetch_meta_row(
        &self,
        run_number: RunNumber,
    ) -> Result<Option<RunRecord>, SqliteStoreError> {
        let run_num = encode_run_number(run_number)?;
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT run_num, det_id, run_type, software_version, filename, start_time, \
                 stop_time FROM run_registry_meta WHERE run_num = ?1",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        stmt.query_row(params![run_num], decode_record_row)
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            .transpose()
    }

    /// Fetches the `amount` most recent metadata rows.
    fn fetch_meta_last_rows(&self, amount: u64) -> Result<Vec<RunRecord>, SqliteStoreError> {
        let limit = i64::try_from(amount)
            .map_err(|_| SqliteStoreError::Invalid("amount too large".to_string()))?;
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT run_num, det_id, run_type, software_version, filename, start_time, \
                 stop_time FROM run_registry_meta ORDER BY run_num DESC LIMIT ?1",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![limit], decode_record_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|err| SqliteStoreError::Db(err.to_string()))??);
        }
        Ok(records)
    }

    /// Fetches the blob row for a run number.
    fn fetch_blob_row(&self, run_number: RunNumber) -> Result<Option<RunBlob>, SqliteStoreError> {
        let run_num = encode_run_number(run_number)?;
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT filename, config_blob FROM run_registry_blob WHERE run_num = ?1",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let row = stmt
            .query_row(params![run_num], |row| {
                let filename: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                Ok((filename, bytes))
            })
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(row.map(|(filename, bytes)| RunBlob {
            run_number,
            filename,
            bytes,
        }))
    }

    /// Sets the stop time if unset, then reads the record back.
    fn update_stop_time_row(
        &self,
        run_number: RunNumber,
        stop_time: Timestamp,
    ) -> Result<Option<RunRecord>, SqliteStoreError> {
        let run_num = encode_run_number(run_number)?;
        let record = {
            let mut guard = self.lock_write()?;
            let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            // First write wins: a stop time already present is kept as-is.
            tx.execute(
                "UPDATE run_registry_meta SET stop_time = COALESCE(stop_time, ?2) WHERE run_num \
                 = ?1",
                params![run_num, stop_time.as_millis()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let record = {
                let mut stmt = tx
                    .prepare_cached(
                        "SELECT run_num, det_id, run_type, software_version, filename, \
                         start_time, stop_time FROM run_registry_meta WHERE run_num = ?1",
                    )
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                stmt.query_row(params![run_num], decode_record_row)
                    .optional()
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            };
            tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            record
        };
        record.transpose()
    }
}

impl RegistryStore for SqliteRegistryStore {
    fn insert_run(&self, run: &NewRun, blob_bytes: &[u8]) -> Result<(), StoreError> {
        self.insert_run_atomic(run, blob_bytes).map_err(StoreError::from)
    }

    fn fetch_meta(&self, run_number: RunNumber) -> Result<Option<RunRecord>, StoreError> {
        self.fetch_meta_row(run_number).map_err(StoreError::from)
    }

    fn fetch_meta_last(&self, amount: u64) -> Result<Vec<RunRecord>, StoreError> {
        self.fetch_meta_last_rows(amount).map_err(StoreError::from)
    }

    fn fetch_blob(&self, run_number: RunNumber) -> Result<Option<RunBlob>, StoreError> {
        self.fetch_blob_row(run_number).map_err(StoreError::from)
    }

    fn update_stop_time(
        &self,
        run_number: RunNumber,
        stop_time: Timestamp,
    ) -> Result<Option<RunRecord>, StoreError> {
        self.update_stop_time_row(run_number, stop_time).map_err(StoreError::from)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock_read()?;
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Codec
// ============================================================================

/// Encodes a run number for SQLite binding.
fn encode_run_number(run_number: RunNumber) -> Result<i64, SqliteStoreError> {
    i64::try_from(run_number.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("run number too large: {run_number}")))
}

/// Decodes one metadata row into a [`RunRecord`].
///
/// The outer `rusqlite::Result` carries column access errors; the inner
/// result carries domain decoding failures.
fn decode_record_row(row: &Row<'_>) -> rusqlite::Result<Result<RunRecord, SqliteStoreError>> {
    let run_num: i64 = row.get(0)?;
    let det_id: String = row.get(1)?;
    let run_type: String = row.get(2)?;
    let software_version: String = row.get(3)?;
    let filename: String = row.get(4)?;
    let start_time: i64 = row.get(5)?;
    let stop_time: Option<i64> = row.get(6)?;
    let Ok(run_num) = u64::try_from(run_num) else {
        return Ok(Err(SqliteStoreError::Invalid(format!("negative run number: {run_num}"))));
    };
    Ok(Ok(RunRecord {
        run_number: RunNumber::new(run_num),
        det_id,
        run_type,
        software_version,
        filename,
        start_time: Timestamp::from_millis(start_time),
        stop_time: stop_time.map(Timestamp::from_millis),
    }))
}

/// Executes one insert statement, mapping key conflicts to [`SqliteStoreError::Conflict`].
fn execute_insert(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    parameters: &[&dyn rusqlite::ToSql],
    run_number: RunNumber,
) -> Result<(), SqliteStoreError> {
    let mut stmt = tx.prepare_cached(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match stmt.execute(parameters) {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(SqliteStoreError::Conflict(format!("run {run_number} already registered")))
        }
        Err(err) => Err(SqliteStoreError::Db(err.to_string())),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an SQLite connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies SQLite pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the SQLite schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS run_registry_meta (
                    run_num INTEGER PRIMARY KEY,
                    det_id TEXT NOT NULL,
                    run_type TEXT NOT NULL,
                    software_version TEXT NOT NULL,
                    filename TEXT NOT NULL,
                    start_time INTEGER NOT NULL,
                    stop_time INTEGER
                );
                CREATE TABLE IF NOT EXISTS run_registry_blob (
                    run_num INTEGER PRIMARY KEY,
                    filename TEXT NOT NULL,
                    config_blob BLOB NOT NULL,
                    FOREIGN KEY (run_num) REFERENCES run_registry_meta(run_num)
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
