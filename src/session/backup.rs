//! Binary backup of the full result set.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{replace_file, SerializeError};
use crate::duplicates::{DuplicateItem, ResultSet};

/// Current version of the backup format.
pub const BACKUP_VERSION: u32 = 1;

/// Envelope written to disk.
#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    /// SHA-256 of the MessagePack-encoded items.
    checksum: String,
    items: &'a [DuplicateItem],
}

/// Envelope read back from disk.
#[derive(Debug, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    items: Vec<DuplicateItem>,
}

fn checksum(items: &[DuplicateItem]) -> Result<String, SerializeError> {
    let encoded = rmp_serde::to_vec_named(items)?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Encode items into backup bytes.
///
/// # Errors
///
/// Returns [`SerializeError::Encode`] if an item cannot be encoded.
pub fn encode(items: &[DuplicateItem]) -> Result<Vec<u8>, SerializeError> {
    let envelope = EnvelopeRef {
        version: BACKUP_VERSION,
        checksum: checksum(items)?,
        items,
    };
    Ok(rmp_serde::to_vec_named(&envelope)?)
}

/// Decode backup bytes and verify their checksum.
///
/// `origin` only labels the error.
///
/// # Errors
///
/// Returns a decode, version or checksum error.
pub fn decode(bytes: &[u8], origin: &Path) -> Result<Vec<DuplicateItem>, SerializeError> {
    let envelope: Envelope = rmp_serde::from_slice(bytes)?;
    if envelope.version != BACKUP_VERSION {
        return Err(SerializeError::UnsupportedVersion {
            found: envelope.version,
            expected: BACKUP_VERSION,
        });
    }
    if checksum(&envelope.items)? != envelope.checksum {
        return Err(SerializeError::ChecksumMismatch(origin.to_path_buf()));
    }
    Ok(envelope.items)
}

/// The backup artifact at a fixed location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    path: PathBuf,
}

impl BackupFile {
    /// Backup stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the artifact.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole result set, previews included.
    ///
    /// # Errors
    ///
    /// Returns an encode or I/O error; the previous backup is left intact.
    pub fn save(&self, results: &ResultSet) -> Result<(), SerializeError> {
        let bytes = encode(results.items())?;
        replace_file(&self.path, &bytes)?;
        log::debug!(
            "Backup of {} item(s) written to {}",
            results.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the backup.
    ///
    /// A missing or zero-length file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, decoded or
    /// verified, or if it holds two items with the same path.
    pub fn load(&self) -> Result<Option<ResultSet>, SerializeError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No backup at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(SerializeError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        if bytes.is_empty() {
            log::debug!("Backup at {} is empty", self.path.display());
            return Ok(None);
        }
        let items = decode(&bytes, &self.path)?;
        let results = ResultSet::from_items(items)?;
        log::info!(
            "Restored {} item(s) from {}",
            results.len(),
            self.path.display()
        );
        Ok(Some(results))
    }
}
