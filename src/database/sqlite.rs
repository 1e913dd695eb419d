//! SQLite-backed scan metadata database.
//!
//! Mutations run inside a transaction opened lazily on the first write;
//! [`ScanDatabase::persist`] commits it. Dropping the handle without
//! persisting rolls the pending changes back, so a batch that never
//! reaches its final persist leaves the store as it was.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{DatabaseEntry, DatabaseError, DatabaseResult, ScanDatabase};
use crate::paths::path_key;

/// Persistent [`ScanDatabase`] stored in a single SQLite file.
pub struct SqliteDatabase {
    conn: Connection,
    db_path: PathBuf,
    in_transaction: bool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("db_path", &self.db_path)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl SqliteDatabase {
    /// Open or create the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::OpenFailed`] if the file or its parent
    /// directory cannot be created, or a query error if the schema cannot
    /// be applied.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a query error if the schema cannot be applied.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> DatabaseResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                path_key TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                metadata BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS blacklist (
                path_key TEXT PRIMARY KEY,
                path TEXT NOT NULL
            );",
        )?;
        log::debug!("Opened scan database at {}", db_path.display());
        Ok(Self {
            conn,
            db_path,
            in_transaction: false,
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Store an entry, as the scan pipeline would.
    ///
    /// # Errors
    ///
    /// Returns a query error if the insert fails.
    pub fn insert(&mut self, path: &Path, entry: &DatabaseEntry) -> DatabaseResult<()> {
        self.begin()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (path_key, path, metadata) VALUES (?1, ?2, ?3)",
            params![path_key(path), path.to_string_lossy().into_owned(), entry.metadata],
        )?;
        Ok(())
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns a query error if the count fails.
    pub fn len(&self) -> DatabaseResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// True if `path` was blacklisted.
    ///
    /// # Errors
    ///
    /// Returns a query error if the lookup fails.
    pub fn is_blacklisted(&self, path: &Path) -> DatabaseResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM blacklist WHERE path_key = ?1",
                params![path_key(path)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn begin(&mut self) -> DatabaseResult<()> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl ScanDatabase for SqliteDatabase {
    fn lookup(&self, path: &Path) -> DatabaseResult<Option<DatabaseEntry>> {
        let metadata: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT metadata FROM entries WHERE path_key = ?1",
                params![path_key(path)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(metadata.map(DatabaseEntry::new))
    }

    fn rekey(&mut self, old: &Path, new: &Path) -> DatabaseResult<bool> {
        self.begin()?;
        let old_key = path_key(old);
        let new_key = path_key(new);
        if old_key == new_key {
            let changed = self.conn.execute(
                "UPDATE entries SET path = ?2 WHERE path_key = ?1",
                params![old_key, new.to_string_lossy().into_owned()],
            )?;
            return Ok(changed > 0);
        }
        self.conn
            .execute("DELETE FROM entries WHERE path_key = ?1", params![new_key])?;
        let changed = self.conn.execute(
            "UPDATE entries SET path_key = ?2, path = ?3 WHERE path_key = ?1",
            params![old_key, new_key, new.to_string_lossy().into_owned()],
        )?;
        if changed == 0 {
            log::debug!("No database entry to re-key for {}", old.display());
        }
        Ok(changed > 0)
    }

    fn remove(&mut self, path: &Path) -> DatabaseResult<bool> {
        self.begin()?;
        let changed = self.conn.execute(
            "DELETE FROM entries WHERE path_key = ?1",
            params![path_key(path)],
        )?;
        Ok(changed > 0)
    }

    fn blacklist(&mut self, path: &Path) -> DatabaseResult<()> {
        self.begin()?;
        self.conn.execute(
            "INSERT OR IGNORE INTO blacklist (path_key, path) VALUES (?1, ?2)",
            params![path_key(path), path.to_string_lossy().into_owned()],
        )?;
        Ok(())
    }

    fn persist(&mut self) -> DatabaseResult<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
            log::debug!("Scan database committed: {}", self.db_path.display());
        }
        Ok(())
    }
}
