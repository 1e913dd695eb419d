//! Persistence of the result set.
//!
//! Two artifacts are supported:
//!
//! * **Backup** ([`backup`]): the full result set including preview
//!   thumbnails, written as a versioned MessagePack envelope with a SHA-256
//!   checksum. A missing or empty backup simply means "no backup".
//! * **Portable JSON** ([`portable`]): the semantic fields only, sorted by
//!   group so the file reads naturally. Used for export and import.
//!
//! Both formats replace files through a sibling temp file and a rename, so
//! an interrupted write never truncates the previous artifact.

pub mod backup;
pub mod portable;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::duplicates::ResultsError;
use crate::error::ErrorKind;

pub use backup::{BackupFile, BACKUP_VERSION};
pub use portable::{export_json, import_json, read_json, write_json, PortableItem};

/// Errors reading or writing a result artifact.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The artifact could not be read or written.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// MessagePack encoding failed.
    #[error("failed to encode backup: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("failed to decode backup: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// JSON encoding or decoding failed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored checksum does not match the content.
    #[error("backup integrity check failed for {0}: checksum mismatch")]
    ChecksumMismatch(PathBuf),

    /// The artifact was written by an incompatible version.
    #[error("unsupported backup version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The artifact decoded but its items break the result set invariants.
    #[error("invalid result set: {0}")]
    Invalid(#[from] ResultsError),
}

impl SerializeError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Serialization
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write `bytes` to `path` through a sibling temp file.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), SerializeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SerializeError::io(parent, e))?;
    }
    let tmp = crate::paths::with_suffix(path, ".tmp");
    std::fs::write(&tmp, bytes).map_err(|e| SerializeError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        SerializeError::io(path, e)
    })
}
