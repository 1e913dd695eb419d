//! In-memory database backend.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{DatabaseEntry, DatabaseError, DatabaseResult, ScanDatabase};
use crate::paths::path_key;

/// Map-backed [`ScanDatabase`].
///
/// Keys are NFC-normalized. Failures can be switched on per operation to
/// exercise the sync-warning paths of the coordinators.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    entries: BTreeMap<String, (PathBuf, DatabaseEntry)>,
    blacklisted: BTreeSet<String>,
    persist_count: usize,
    fail_rekey: bool,
    fail_persist: bool,
}

impl MemoryDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry, as the scan pipeline would.
    pub fn insert(&mut self, path: PathBuf, entry: DatabaseEntry) {
        self.entries.insert(path_key(&path), (path, entry));
    }

    /// All stored paths in key order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.values().map(|(p, _)| p.clone()).collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `path` was blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self, path: &Path) -> bool {
        self.blacklisted.contains(&path_key(path))
    }

    /// How many times [`ScanDatabase::persist`] succeeded.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.persist_count
    }

    /// Make every subsequent re-key fail.
    pub fn set_fail_rekey(&mut self, fail: bool) {
        self.fail_rekey = fail;
    }

    /// Make every subsequent persist fail.
    pub fn set_fail_persist(&mut self, fail: bool) {
        self.fail_persist = fail;
    }
}

impl ScanDatabase for MemoryDatabase {
    fn lookup(&self, path: &Path) -> DatabaseResult<Option<DatabaseEntry>> {
        Ok(self.entries.get(&path_key(path)).map(|(_, e)| e.clone()))
    }

    fn rekey(&mut self, old: &Path, new: &Path) -> DatabaseResult<bool> {
        if self.fail_rekey {
            return Err(DatabaseError::Unavailable(format!(
                "re-key {} -> {} refused",
                old.display(),
                new.display()
            )));
        }
        let moved = self.entries.remove(&path_key(old));
        // Matches the sqlite store: whatever sat at `new` is gone either way
        self.entries.remove(&path_key(new));
        match moved {
            Some((_, entry)) => {
                self.entries
                    .insert(path_key(new), (new.to_path_buf(), entry));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&mut self, path: &Path) -> DatabaseResult<bool> {
        Ok(self.entries.remove(&path_key(path)).is_some())
    }

    fn blacklist(&mut self, path: &Path) -> DatabaseResult<()> {
        self.blacklisted.insert(path_key(path));
        Ok(())
    }

    fn persist(&mut self) -> DatabaseResult<()> {
        if self.fail_persist {
            return Err(DatabaseError::Unavailable("persist refused".to_string()));
        }
        self.persist_count += 1;
        Ok(())
    }
}
