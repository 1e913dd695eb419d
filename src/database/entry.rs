//! Database entry definition.

use serde::{Deserialize, Serialize};

/// Metadata the scan pipeline stored for one file.
///
/// The payload (hashes, timestamps, fingerprints) is produced and read by
/// the scan subsystem only; this crate moves it between keys untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    /// Opaque encoded metadata.
    pub metadata: Vec<u8>,
}

impl DatabaseEntry {
    /// Wrap an encoded payload.
    #[must_use]
    pub fn new(metadata: Vec<u8>) -> Self {
        Self { metadata }
    }
}
