//! Disk actions applied to a single duplicate.
//!
//! # Overview
//!
//! This module provides the per-file primitives the batch engine uses:
//! - Move to system trash, falling back to permanent removal where the
//!   platform has no trash for the path (network shares, some mounts)
//! - Permanent deletion
//! - Replacing a duplicate with a symbolic link to the copy that is kept
//!
//! None of these touch the result set or the database; callers do that
//! after a primitive reports success.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::actions::delete::{delete_to_trash, TrashFallback};
//! use std::path::Path;
//!
//! match delete_to_trash(Path::new("/path/to/duplicate.jpg"), TrashFallback::Permanent) {
//!     Ok(result) => println!("Removed: {}", result.path.display()),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::ErrorKind;

/// Error type for disk actions.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0} - try running with elevated privileges")]
    PermissionDenied(PathBuf),

    /// Trash operation failed and no fallback was allowed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed { path: PathBuf, message: String },

    /// Every member of the group is selected, so nothing is left to link to.
    #[error("cannot create a symbolic link for {0} because every item in its group is selected")]
    NoLinkTarget(PathBuf),

    /// Creating the symbolic link failed; the original file was restored.
    #[error("symbolic link {path} -> {target} failed: {message}")]
    SymlinkFailed {
        path: PathBuf,
        target: PathBuf,
        message: String,
    },

    /// The name the original would be parked under is already in use.
    #[error("cannot park {path} while linking: {parked} already exists")]
    ParkedPathTaken { path: PathBuf, parked: PathBuf },

    /// Symbolic link failed and the original could not be put back.
    #[error("symbolic link for {path} failed ({message}); original left at {parked}: {restore_error}")]
    SymlinkRestoreFailed {
        path: PathBuf,
        parked: PathBuf,
        message: String,
        restore_error: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::NoLinkTarget(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::SymlinkFailed { path: p, .. }
            | Self::ParkedPathTaken { path: p, .. }
            | Self::SymlinkRestoreFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoLinkTarget(_) => ErrorKind::Validation,
            _ => ErrorKind::Filesystem,
        }
    }

    fn from_metadata(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// How a disk action removed or replaced a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// Moved to the platform trash.
    Trashed,
    /// Removed for good.
    Deleted,
    /// Replaced by a symbolic link.
    Linked,
}

/// Result of a successful disk action.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// Path that was acted on.
    pub path: PathBuf,
    /// Size of the file in bytes before the action.
    pub size: u64,
    /// What happened to the file.
    pub disposal: Disposal,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, disposal: Disposal) -> Self {
        Self {
            path,
            size,
            disposal,
        }
    }
}

/// What to do when the trash rejects a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashFallback {
    /// Report the failure.
    Fail,
    /// Delete the file permanently instead.
    Permanent,
}

fn file_size(path: &Path) -> Result<u64, DeleteError> {
    fs::symlink_metadata(path)
        .map(|m| m.len())
        .map_err(|e| DeleteError::from_metadata(path, e))
}

/// Move a file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file can't be inspected
/// - `TrashFailed` if the trash rejects the file and `fallback` is `Fail`
/// - `PermanentDeleteFailed` if the fallback removal also fails
pub fn delete_to_trash(path: &Path, fallback: TrashFallback) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;

    match trash::delete(path) {
        Ok(()) => {
            log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
            Ok(DeleteResult::new(path.to_path_buf(), size, Disposal::Trashed))
        }
        Err(e) if fallback == TrashFallback::Permanent => {
            log::warn!(
                "Trash unavailable for {} ({}), deleting permanently",
                path.display(),
                e
            );
            permanent_delete(path)
        }
        Err(e) => {
            log::error!("Trash operation failed for {}: {}", path.display(), e);
            Err(DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file can't be inspected
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);

    Ok(DeleteResult::new(path.to_path_buf(), size, Disposal::Deleted))
}

/// Replace `path` with a symbolic link pointing at `target`.
///
/// The original is parked under `parked_suffix` while the link is created
/// and removed only once the link exists; if linking fails the original is
/// moved back.
///
/// # Errors
///
/// - `NotFound`/`PermissionDenied`/`Io` if the file can't be parked
/// - `ParkedPathTaken` if something already sits at the parked name; nothing
///   is moved in that case
/// - `SymlinkFailed` if the link could not be created (original restored)
/// - `SymlinkRestoreFailed` if the original could not be restored either
pub fn replace_with_symlink(
    path: &Path,
    target: &Path,
    parked_suffix: &str,
) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;
    let parked = crate::paths::with_suffix(path, parked_suffix);

    // rename(2) replaces an existing destination silently
    match fs::symlink_metadata(&parked) {
        Ok(_) => {
            log::warn!(
                "Not linking {}: parked name {} is taken",
                path.display(),
                parked.display()
            );
            return Err(DeleteError::ParkedPathTaken {
                path: path.to_path_buf(),
                parked,
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(DeleteError::from_metadata(&parked, e)),
    }

    fs::rename(path, &parked).map_err(|e| DeleteError::from_metadata(path, e))?;

    if let Err(e) = create_symlink(target, path) {
        log::warn!(
            "Symbolic link {} -> {} failed: {}",
            path.display(),
            target.display(),
            e
        );
        return match fs::rename(&parked, path) {
            Ok(()) => Err(DeleteError::SymlinkFailed {
                path: path.to_path_buf(),
                target: target.to_path_buf(),
                message: e.to_string(),
            }),
            Err(restore) => {
                log::error!(
                    "Could not restore {} from {}: {}",
                    path.display(),
                    parked.display(),
                    restore
                );
                Err(DeleteError::SymlinkRestoreFailed {
                    path: path.to_path_buf(),
                    parked,
                    message: e.to_string(),
                    restore_error: restore.to_string(),
                })
            }
        };
    }

    if let Err(e) = fs::remove_file(&parked) {
        // The link is in place; the parked copy only wastes space.
        log::warn!(
            "Linked {} but could not remove parked original {}: {}",
            path.display(),
            parked.display(),
            e
        );
    }

    log::info!(
        "Replaced {} with a link to {} ({} bytes)",
        path.display(),
        target.display(),
        size
    );
    Ok(DeleteResult::new(path.to_path_buf(), size, Disposal::Linked))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
