//! Contract for the scan pipeline's per-file metadata database.
//!
//! The database is owned by the scan subsystem. This crate only moves
//! entries between path keys, removes them, and asks for persistence; the
//! metadata payload itself is opaque.
//!
//! # Architecture
//!
//! * [`ScanDatabase`]: the trait every backend implements.
//! * [`memory`]: in-process map, used for embedding and tests.
//! * [`sqlite`]: the reference on-disk store used by the CLI.
//! * [`SharedDatabase`]: serializes mutations from several owners through
//!   one lock so two re-keys of the same path can never interleave.

pub mod entry;
pub mod memory;
pub mod sqlite;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::error::ErrorKind;

pub use entry::DatabaseEntry;
pub use memory::MemoryDatabase;
pub use sqlite::SqliteDatabase;

/// Errors reported by a database backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLite reported an error.
    #[error("database query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The backing store could not be opened.
    #[error("failed to open database at {path}: {reason}")]
    OpenFailed {
        /// Database location.
        path: std::path::PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The backend refused the operation.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Another owner panicked while holding the database lock.
    #[error("database lock poisoned")]
    Poisoned,
}

impl DatabaseError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DatabaseSync
    }
}

/// Result alias for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Operations the core requires from the scan metadata store.
pub trait ScanDatabase {
    /// Fetch the entry stored under `path`.
    fn lookup(&self, path: &Path) -> DatabaseResult<Option<DatabaseEntry>>;

    /// Move the entry stored under `old` to `new`, replacing anything at
    /// `new`. Returns false if `old` had no entry.
    fn rekey(&mut self, old: &Path, new: &Path) -> DatabaseResult<bool>;

    /// Drop the entry stored under `path`. Returns false if there was none.
    fn remove(&mut self, path: &Path) -> DatabaseResult<bool>;

    /// Mark `path` so future scans skip the file.
    fn blacklist(&mut self, path: &Path) -> DatabaseResult<()>;

    /// Make every change since the last call durable.
    fn persist(&mut self) -> DatabaseResult<()>;
}

impl<D: ScanDatabase + ?Sized> ScanDatabase for Box<D> {
    fn lookup(&self, path: &Path) -> DatabaseResult<Option<DatabaseEntry>> {
        (**self).lookup(path)
    }

    fn rekey(&mut self, old: &Path, new: &Path) -> DatabaseResult<bool> {
        (**self).rekey(old, new)
    }

    fn remove(&mut self, path: &Path) -> DatabaseResult<bool> {
        (**self).remove(path)
    }

    fn blacklist(&mut self, path: &Path) -> DatabaseResult<()> {
        (**self).blacklist(path)
    }

    fn persist(&mut self) -> DatabaseResult<()> {
        (**self).persist()
    }
}

/// Cloneable handle that funnels every call through a single lock.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Box<dyn ScanDatabase + Send>>>,
}

impl std::fmt::Debug for SharedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDatabase").finish_non_exhaustive()
    }
}

impl SharedDatabase {
    /// Wrap a backend.
    pub fn new<D: ScanDatabase + Send + 'static>(db: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(db))),
        }
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, Box<dyn ScanDatabase + Send>>> {
        self.inner.lock().map_err(|_| DatabaseError::Poisoned)
    }
}

impl ScanDatabase for SharedDatabase {
    fn lookup(&self, path: &Path) -> DatabaseResult<Option<DatabaseEntry>> {
        self.lock()?.lookup(path)
    }

    fn rekey(&mut self, old: &Path, new: &Path) -> DatabaseResult<bool> {
        self.lock()?.rekey(old, new)
    }

    fn remove(&mut self, path: &Path) -> DatabaseResult<bool> {
        self.lock()?.remove(path)
    }

    fn blacklist(&mut self, path: &Path) -> DatabaseResult<()> {
        self.lock()?.blacklist(path)
    }

    fn persist(&mut self) -> DatabaseResult<()> {
        self.lock()?.persist()
    }
}
