//! Portable JSON export and import.
//!
//! The file is a JSON array of [`PortableItem`] records sorted by group
//! identifier. Field names are part of the format and must not change.
//! Preview thumbnails and check marks are not exported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{replace_file, SerializeError};
use crate::duplicates::{DuplicateItem, GroupId, MediaKind, ResultSet};

/// One item as written to the portable format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableItem {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Playback duration, written as `{"secs", "nanos"}` so no precision
    /// is lost.
    pub duration: Duration,
    /// Frame width in pixels.
    pub frame_width: u32,
    /// Frame height in pixels.
    pub frame_height: u32,
    /// Group identifier.
    pub group_id: GroupId,
    /// Similarity to the rest of the group, 0..=100.
    pub similarity: f32,
    /// File creation timestamp.
    pub created: DateTime<Utc>,
    /// Image or video.
    pub media_kind: MediaKind,
}

impl From<&DuplicateItem> for PortableItem {
    fn from(item: &DuplicateItem) -> Self {
        Self {
            path: item.path.clone(),
            size: item.size,
            duration: item.duration,
            frame_width: item.frame_width,
            frame_height: item.frame_height,
            group_id: item.group_id,
            similarity: item.similarity,
            created: item.created,
            media_kind: item.media_kind,
        }
    }
}

impl From<PortableItem> for DuplicateItem {
    fn from(item: PortableItem) -> Self {
        Self {
            path: item.path,
            size: item.size,
            media_kind: item.media_kind,
            duration: item.duration,
            frame_width: item.frame_width,
            frame_height: item.frame_height,
            similarity: item.similarity,
            created: item.created,
            group_id: item.group_id,
            checked: false,
            previews: Vec::new(),
        }
    }
}

/// Render the result set as portable JSON.
///
/// # Errors
///
/// Returns [`SerializeError::Json`] if encoding fails.
pub fn export_json(results: &ResultSet, pretty: bool) -> Result<String, SerializeError> {
    let records: Vec<PortableItem> = results
        .sorted_by_group()
        .into_iter()
        .map(PortableItem::from)
        .collect();
    let json = if pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    Ok(json)
}

/// Parse portable JSON into a new result set.
///
/// # Errors
///
/// Returns [`SerializeError::Json`] for malformed input and
/// [`SerializeError::Invalid`] if two records share a path.
pub fn import_json(json: &str) -> Result<ResultSet, SerializeError> {
    let records: Vec<PortableItem> = serde_json::from_str(json)?;
    let items = records.into_iter().map(DuplicateItem::from).collect();
    Ok(ResultSet::from_items(items)?)
}

/// Export to a file.
///
/// # Errors
///
/// Returns an encoding or I/O error.
pub fn write_json(results: &ResultSet, path: &Path, pretty: bool) -> Result<(), SerializeError> {
    let json = export_json(results, pretty)?;
    replace_file(path, json.as_bytes())?;
    log::info!("Exported {} item(s) to {}", results.len(), path.display());
    Ok(())
}

/// Import from a file.
///
/// # Errors
///
/// Returns an I/O, parse or validation error.
pub fn read_json(path: &Path) -> Result<ResultSet, SerializeError> {
    let json = std::fs::read_to_string(path).map_err(|e| SerializeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let results = import_json(&json)?;
    log::info!("Read {} item(s) from {}", results.len(), path.display());
    Ok(results)
}
