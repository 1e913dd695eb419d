//! Exclusion ledger: groups the user marked "not a match".
//!
//! The ledger is an ordered list of path sets persisted as a JSON array of
//! arrays. A group is hidden only when every one of its live members
//! appears in a single ledger entry; partial overlap with one entry, or
//! coverage spread across several entries, does not hide it.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::exclusion::ExclusionLedger;
//! use dupekeep::duplicates::ResultSet;
//! use std::path::Path;
//!
//! let ledger = ExclusionLedger::load(Path::new("excluded_groups.json"));
//! let mut results = ResultSet::new();
//! let hidden = ledger.apply(&mut results);
//! println!("{} excluded item(s) hidden", hidden.len());
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::duplicates::{DuplicateItem, GroupId, ResultSet};
use crate::error::ErrorKind;
use crate::paths::path_key;

/// Errors raised by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The group has no live members.
    #[error("group {0} has no items in the result set")]
    UnknownGroup(GroupId),

    /// The ledger could not be serialized.
    #[error("failed to serialize exclusion ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The ledger file could not be written.
    #[error("failed to write exclusion ledger {path}: {source}")]
    Io {
        /// Ledger location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl LedgerError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownGroup(_) => ErrorKind::Validation,
            Self::Serialize(_) | Self::Io { .. } => ErrorKind::Serialization,
        }
    }
}

/// Persisted list of excluded path sets.
#[derive(Debug, Clone, Default)]
pub struct ExclusionLedger {
    entries: Vec<BTreeSet<PathBuf>>,
    path: Option<PathBuf>,
}

impl ExclusionLedger {
    /// Ledger that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the ledger stored at `path`.
    ///
    /// A missing, empty or unreadable file yields an empty ledger bound to
    /// `path`; the problem is logged, never returned.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match Self::read_entries(path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable exclusion ledger {}: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        };
        log::debug!(
            "Loaded {} exclusion entr(y/ies) from {}",
            entries.len(),
            path.display()
        );
        Self {
            entries,
            path: Some(path.to_path_buf()),
        }
    }

    fn read_entries(path: &Path) -> anyhow::Result<Vec<BTreeSet<PathBuf>>> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&content)?)
    }

    /// Where the ledger is persisted, if anywhere.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The excluded path sets in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[BTreeSet<PathBuf>] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was ever excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the ledger to its file.
    ///
    /// The JSON is written to a sibling temp file first and renamed into
    /// place, so a failed write leaves the previous ledger intact.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if serialization or any file operation fails.
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec(&self.entries)?;
        let tmp = crate::paths::with_suffix(path, ".tmp");
        let io_err = |source| LedgerError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&tmp, json).map_err(io_err)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(e));
        }
        log::debug!("Saved exclusion ledger to {}", path.display());
        Ok(())
    }

    /// Exclude a group: record its live paths, persist, then drop its items.
    ///
    /// If persisting fails the new entry is discarded and the result set is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownGroup`] for a group with no live
    /// members, or the persistence error.
    pub fn exclude(
        &mut self,
        group: GroupId,
        results: &mut ResultSet,
    ) -> Result<Vec<DuplicateItem>, LedgerError> {
        let snapshot: BTreeSet<PathBuf> = results.group_paths(group).into_iter().collect();
        if snapshot.is_empty() {
            return Err(LedgerError::UnknownGroup(group));
        }

        self.entries.push(snapshot);
        if let Err(e) = self.save() {
            self.entries.pop();
            log::error!("Failed to exclude group {}: {}", group, e);
            return Err(e);
        }

        let removed = results.extract_if(|item| item.group_id == group);
        log::info!("Excluded group {} ({} item(s))", group, removed.len());
        Ok(removed)
    }

    /// Remove every item whose whole group is covered by a single entry.
    #[must_use = "the hidden items are returned for reporting"]
    pub fn apply(&self, results: &mut ResultSet) -> Vec<DuplicateItem> {
        if self.entries.is_empty() || results.is_empty() {
            return Vec::new();
        }

        let entry_keys: Vec<HashSet<String>> = self
            .entries
            .iter()
            .map(|set| set.iter().map(|p| path_key(p)).collect())
            .collect();

        let mut members: HashMap<GroupId, Vec<String>> = HashMap::new();
        for item in results.iter() {
            members
                .entry(item.group_id)
                .or_default()
                .push(path_key(&item.path));
        }

        let excluded: HashSet<GroupId> = members
            .into_iter()
            .filter(|(_, keys)| {
                entry_keys
                    .iter()
                    .any(|entry| keys.iter().all(|k| entry.contains(k)))
            })
            .map(|(group, _)| group)
            .collect();

        let hidden = results.extract_if(|item| excluded.contains(&item.group_id));
        if !hidden.is_empty() {
            log::info!(
                "Hid {} item(s) in {} excluded group(s)",
                hidden.len(),
                excluded.len()
            );
        }
        hidden
    }
}
