//! A single file reported as part of a duplicate group.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Opaque group identifier, stable for the life of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of media the scan pipeline compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video clip.
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Encoded preview thumbnail attached to an item.
///
/// Only the binary backup carries previews; the portable JSON export
/// drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    /// Thumbnail width in pixels.
    pub width: u32,
    /// Thumbnail height in pixels.
    pub height: u32,
    /// Encoded image bytes (JPEG/PNG as produced by the thumbnailer).
    pub data: Vec<u8>,
}

/// One physical file found to be part of a duplicate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateItem {
    /// Absolute path; changes on rename.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Image or video.
    pub media_kind: MediaKind,
    /// Playback duration (zero for images).
    pub duration: Duration,
    /// Frame width in pixels.
    pub frame_width: u32,
    /// Frame height in pixels.
    pub frame_height: u32,
    /// Similarity to the rest of the group, 0..=100.
    pub similarity: f32,
    /// File creation timestamp.
    pub created: DateTime<Utc>,
    /// Group this item belongs to.
    pub group_id: GroupId,
    /// Whether the user selected this item for the next batch action.
    #[serde(default)]
    pub checked: bool,
    /// Preview thumbnails.
    #[serde(default)]
    pub previews: Vec<Preview>,
}

impl DuplicateItem {
    /// Create an image item with neutral metadata.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path of the file
    /// * `size` - File size in bytes
    /// * `group_id` - Group the item belongs to
    #[must_use]
    pub fn new(path: PathBuf, size: u64, group_id: GroupId) -> Self {
        Self {
            path,
            size,
            media_kind: MediaKind::Image,
            duration: Duration::ZERO,
            frame_width: 0,
            frame_height: 0,
            similarity: 100.0,
            created: Utc::now(),
            group_id,
            checked: false,
            previews: Vec::new(),
        }
    }

    /// Set the media kind.
    #[must_use]
    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }

    /// Set the similarity score.
    #[must_use]
    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set the frame dimensions.
    #[must_use]
    pub fn with_frame(mut self, width: u32, height: u32) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self
    }

    /// Set the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the checked flag.
    #[must_use]
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Attach a preview thumbnail.
    #[must_use]
    pub fn with_preview(mut self, preview: Preview) -> Self {
        self.previews.push(preview);
        self
    }

    /// True for still images.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.media_kind == MediaKind::Image
    }
}
