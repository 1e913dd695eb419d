//! Operations that change files on disk.
//!
//! This module provides:
//! - Single-file renames and two-file name swaps ([`rename`])
//! - Per-file removal primitives: trash, permanent delete, symbolic link
//!   replacement ([`delete`])
//! - The filtered batch resolution engine built on them ([`resolve`])
//!
//! Every operation keeps the result set, the scan database and the disk
//! in agreement. Database failures that happen after a file was already
//! moved or removed never undo the physical change; they are reported as
//! [`SyncWarning`]s next to the successful outcome.
//!
//! ```no_run
//! use dupekeep::actions::resolve::{resolve_batch, ResolveMode, ResolveOptions, ResolveRequest};
//! use dupekeep::database::MemoryDatabase;
//! use dupekeep::duplicates::ResultSet;
//!
//! let mut results = ResultSet::new();
//! let mut db = MemoryDatabase::new();
//! let request = ResolveRequest::new(ResolveMode::Trash);
//! let outcome = resolve_batch(&mut results, &mut db, &request, &ResolveOptions::default(), None, None);
//! ```

pub mod delete;
pub mod rename;
pub mod resolve;

use std::fmt;
use std::path::PathBuf;

use crate::database::DatabaseError;
use crate::error::ErrorKind;

pub use delete::{
    delete_to_trash, permanent_delete, replace_with_symlink, DeleteError, DeleteResult, Disposal,
    TrashFallback,
};
pub use rename::{
    ConflictDecision, ConflictResolver, NewName, PathChange, RenameCoordinator, RenameError,
    RenameOptions, RenameOutcome, SwapOutcome, SwapSelection, SwapStep,
};
pub use resolve::{
    resolve_batch, BatchOutcome, ItemFailure, ResolveError, ResolveFilter, ResolveMode,
    ResolveOptions, ResolveProgress, ResolveRequest, SimilarityRange,
};

/// A database update that failed after the disk was already changed.
///
/// The in-memory result set reflects the disk; only the scan database is
/// behind.
#[derive(Debug)]
pub struct SyncWarning {
    /// Path the database should now know about, empty for a failed persist.
    pub path: PathBuf,
    /// What the database reported.
    pub error: DatabaseError,
}

impl SyncWarning {
    /// Pair a path with the database failure that concerned it.
    #[must_use]
    pub fn new(path: PathBuf, error: DatabaseError) -> Self {
        Self { path, error }
    }

    /// Always [`ErrorKind::DatabaseSync`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DatabaseSync
    }
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.as_os_str().is_empty() {
            write!(f, "scan database not saved: {}", self.error)
        } else {
            write!(
                f,
                "scan database out of sync for {}: {}",
                self.path.display(),
                self.error
            )
        }
    }
}
