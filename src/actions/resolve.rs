//! Filtered batch resolution of checked duplicates.
//!
//! # Overview
//!
//! A batch runs in three phases:
//! 1. **Filter**: when any filter is active, groups with no member matching
//!    the path and media filters are unchecked entirely; inside included
//!    groups, members outside the similarity range are unchecked.
//! 2. **Resolve**: every checked item, last to first, is removed from the
//!    list after its disk action (if any) succeeds. A failed item stays in
//!    the list and the batch moves on.
//! 3. **Repair**: groups left with a single member are dropped and the
//!    scan database is persisted once.
//!
//! Cancellation is honoured between items only.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::delete::{
    delete_to_trash, permanent_delete, replace_with_symlink, DeleteError, DeleteResult, Disposal,
    TrashFallback,
};
use super::SyncWarning;
use crate::config::Config;
use crate::database::ScanDatabase;
use crate::duplicates::{DuplicateItem, GroupId, MediaKind, ResultSet};
use crate::error::ErrorKind;

/// Errors raised while building a batch request.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Similarity bounds outside 0..=100 or reversed.
    #[error("invalid similarity range {from}..{to}: bounds must lie within 0..100 and from <= to")]
    InvalidSimilarityRange { from: f32, to: f32 },
}

impl ResolveError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Inclusive similarity bounds in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityRange {
    from: f32,
    to: f32,
}

impl SimilarityRange {
    /// The whole 0..=100 range.
    pub const FULL: Self = Self {
        from: 0.0,
        to: 100.0,
    };

    /// Build a range.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidSimilarityRange`] if either bound is
    /// outside 0..=100 (or NaN) or `from > to`.
    pub fn new(from: f32, to: f32) -> Result<Self, ResolveError> {
        let bounds = 0.0..=100.0;
        if !bounds.contains(&from) || !bounds.contains(&to) || from > to {
            return Err(ResolveError::InvalidSimilarityRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Lower bound.
    #[must_use]
    pub fn from(&self) -> f32 {
        self.from
    }

    /// Upper bound.
    #[must_use]
    pub fn to(&self) -> f32 {
        self.to
    }

    /// True if `similarity` lies within the bounds.
    #[must_use]
    pub fn contains(&self, similarity: f32) -> bool {
        similarity >= self.from && similarity <= self.to
    }

    /// True for the unrestricted range.
    #[must_use]
    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }
}

impl Default for SimilarityRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Which groups and items a batch may touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveFilter {
    /// Case-insensitive substring a member path must contain.
    pub path_contains: Option<String>,
    /// Media kind a member must have.
    pub media_kind: Option<MediaKind>,
    /// Similarity bounds for individual items.
    pub similarity: SimilarityRange,
}

impl ResolveFilter {
    /// True if any filter restricts the batch.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.path_contains.as_deref().is_some_and(|s| !s.is_empty())
            || self.media_kind.is_some()
            || !self.similarity.is_full()
    }

    fn includes_group_of(&self, item: &DuplicateItem, needle: Option<&str>) -> bool {
        if self.media_kind.is_some_and(|kind| kind != item.media_kind) {
            return false;
        }
        match needle {
            Some(needle) => item
                .path
                .to_string_lossy()
                .to_lowercase()
                .contains(needle),
            None => true,
        }
    }

    /// Uncheck everything the filter excludes. Returns how many items were
    /// unchecked; does nothing when no filter is active.
    pub fn apply(&self, results: &mut ResultSet) -> usize {
        if !self.is_active() {
            return 0;
        }
        let needle = self
            .path_contains
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let included: HashSet<GroupId> = results
            .iter()
            .filter(|item| self.includes_group_of(item, needle.as_deref()))
            .map(|item| item.group_id)
            .collect();

        let unchecked = results.uncheck_where(|item| {
            !included.contains(&item.group_id) || !self.similarity.contains(item.similarity)
        });
        log::debug!(
            "Filter kept {} group(s), unchecked {} item(s)",
            included.len(),
            unchecked
        );
        unchecked
    }
}

/// What happens to each checked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Remove from the list, keep the file.
    #[default]
    ListOnly,
    /// Move to the platform trash.
    Trash,
    /// Delete for good.
    Permanent,
    /// Replace with a symbolic link to an unchecked group member.
    SymlinkReplace,
}

impl ResolveMode {
    /// True if the mode changes files on disk.
    #[must_use]
    pub fn touches_disk(&self) -> bool {
        !matches!(self, Self::ListOnly)
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListOnly => write!(f, "remove from list"),
            Self::Trash => write!(f, "move to trash"),
            Self::Permanent => write!(f, "delete permanently"),
            Self::SymlinkReplace => write!(f, "replace with symbolic links"),
        }
    }
}

/// A batch to run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveRequest {
    /// Which items the batch may touch.
    pub filter: ResolveFilter,
    /// What to do with each checked item.
    pub mode: ResolveMode,
    /// Also blacklist every resolved path in the scan database.
    pub exclude: bool,
}

impl ResolveRequest {
    /// Unfiltered request for `mode`.
    #[must_use]
    pub fn new(mode: ResolveMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Set the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ResolveFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the blacklist flag.
    #[must_use]
    pub fn with_exclude(mut self, exclude: bool) -> Self {
        self.exclude = exclude;
        self
    }
}

/// Settings consumed by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// What to do when the trash rejects a file.
    pub trash_fallback: TrashFallback,
    /// Suffix for the original while its symbolic link is created.
    pub link_park_suffix: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            trash_fallback: TrashFallback::Permanent,
            link_park_suffix: ".dkswap".to_string(),
        }
    }
}

impl From<&Config> for ResolveOptions {
    fn from(config: &Config) -> Self {
        Self {
            trash_fallback: if config.trash_fallback_to_permanent {
                TrashFallback::Permanent
            } else {
                TrashFallback::Fail
            },
            link_park_suffix: config.swap_temp_suffix.clone(),
        }
    }
}

/// Progress callback for batch resolution.
///
/// Implement this trait to receive progress updates while a batch runs.
pub trait ResolveProgress: Send + Sync {
    /// Called before each item is resolved.
    fn on_before_resolve(&self, path: &Path, index: usize, total: usize);

    /// Called after an item was resolved.
    fn on_resolve_success(&self, path: &Path, size: u64);

    /// Called after an item failed.
    fn on_resolve_failure(&self, path: &Path, error: &str);

    /// Called when the batch completes.
    fn on_complete(&self, outcome: &BatchOutcome);
}

/// An item removed from the list by a batch.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    /// The removed item.
    pub item: DuplicateItem,
    /// What happened on disk; `None` when only the list changed.
    pub disposal: Option<Disposal>,
}

/// An item the batch could not resolve. It is still in the list.
#[derive(Debug)]
pub struct ItemFailure {
    /// The item's path.
    pub path: PathBuf,
    /// Why it failed.
    pub error: DeleteError,
}

/// Result of a batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Items removed from the list, in processing order.
    pub resolved: Vec<ResolvedItem>,
    /// Items that failed and remain in the list.
    pub failures: Vec<ItemFailure>,
    /// Items dropped because their group shrank to one member.
    pub collapsed: Vec<DuplicateItem>,
    /// Database failures after successful disk actions.
    pub sync_warnings: Vec<SyncWarning>,
    /// Total bytes freed on disk.
    pub bytes_freed: u64,
    /// Items unchecked by the filter before the batch ran.
    pub unchecked_by_filter: usize,
    /// True if the batch stopped early on request.
    pub cancelled: bool,
}

impl BatchOutcome {
    /// Number of resolved items.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.resolved.len()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of attempted items.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.resolved.len() + self.failures.len()
    }

    /// True if no item failed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// True if the batch did less than asked: failures, database warnings
    /// or cancellation.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || !self.sync_warnings.is_empty() || self.cancelled
    }

    /// True if the result set changed.
    #[must_use]
    pub fn changed_list(&self) -> bool {
        !self.resolved.is_empty() || !self.collapsed.is_empty()
    }

    /// Human-readable summary of the batch.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Resolved {} item(s), freed {}",
            self.success_count(),
            ByteSize(self.bytes_freed)
        );
        if !self.failures.is_empty() {
            text.push_str(&format!(", {} failed", self.failure_count()));
        }
        if !self.collapsed.is_empty() {
            text.push_str(&format!(
                ", {} lone item(s) dropped from the list",
                self.collapsed.len()
            ));
        }
        if !self.sync_warnings.is_empty() {
            text.push_str(&format!(
                ", {} database warning(s)",
                self.sync_warnings.len()
            ));
        }
        if self.cancelled {
            text.push_str(" (cancelled)");
        }
        text
    }
}

/// Run one batch over the checked items of `results`.
///
/// Per-item failures are collected in the outcome; nothing here aborts the
/// batch. The database is persisted once at the end when anything in it
/// changed.
///
/// # Example
///
/// ```no_run
/// use dupekeep::actions::resolve::{
///     resolve_batch, ResolveFilter, ResolveMode, ResolveOptions, ResolveRequest, SimilarityRange,
/// };
/// use dupekeep::database::MemoryDatabase;
/// use dupekeep::duplicates::ResultSet;
///
/// let mut results = ResultSet::new();
/// results.check_all_but_first();
/// let mut db = MemoryDatabase::new();
/// let request = ResolveRequest::new(ResolveMode::Trash).with_filter(ResolveFilter {
///     similarity: SimilarityRange::new(90.0, 100.0).unwrap(),
///     ..ResolveFilter::default()
/// });
///
/// let outcome = resolve_batch(&mut results, &mut db, &request, &ResolveOptions::default(), None, None);
/// println!("{}", outcome.summary());
/// ```
pub fn resolve_batch<D: ScanDatabase + ?Sized>(
    results: &mut ResultSet,
    db: &mut D,
    request: &ResolveRequest,
    options: &ResolveOptions,
    progress: Option<&dyn ResolveProgress>,
    cancel: Option<&AtomicBool>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        unchecked_by_filter: request.filter.apply(results),
        ..BatchOutcome::default()
    };

    let targets: Vec<usize> = (0..results.len())
        .rev()
        .filter(|&i| results.get_at(i).checked)
        .collect();
    let total = targets.len();
    log::info!("Resolving {} item(s): {}", total, request.mode);

    let mut database_changed = false;
    for (position, index) in targets.into_iter().enumerate() {
        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            log::info!("Batch cancelled after {} of {} item(s)", position, total);
            outcome.cancelled = true;
            break;
        }

        let path = results.get_at(index).path.clone();
        if let Some(cb) = progress {
            cb.on_before_resolve(&path, position, total);
        }

        let disposal = match dispose(results, index, request.mode, options) {
            Ok(Some(done)) => {
                outcome.bytes_freed += done.size;
                database_changed = true;
                if let Err(error) = db.remove(&path) {
                    log::warn!("Database remove for {} failed: {}", path.display(), error);
                    outcome
                        .sync_warnings
                        .push(SyncWarning::new(path.clone(), error));
                }
                Some(done.disposal)
            }
            Ok(None) => None,
            Err(error) => {
                log::warn!("Failed to resolve {}: {}", path.display(), error);
                if let Some(cb) = progress {
                    cb.on_resolve_failure(&path, &error.to_string());
                }
                outcome.failures.push(ItemFailure { path, error });
                continue;
            }
        };

        if request.exclude {
            database_changed = true;
            if let Err(error) = db.blacklist(&path) {
                log::warn!("Database blacklist for {} failed: {}", path.display(), error);
                outcome
                    .sync_warnings
                    .push(SyncWarning::new(path.clone(), error));
            }
        }

        let item = results.remove_at(index);
        if let Some(cb) = progress {
            cb.on_resolve_success(&path, item.size);
        }
        outcome.resolved.push(ResolvedItem { item, disposal });
    }

    outcome.collapsed = results.collapse_singletons();
    if !outcome.collapsed.is_empty() {
        log::debug!(
            "Dropped {} item(s) left alone in their group",
            outcome.collapsed.len()
        );
    }

    if database_changed {
        match db.persist() {
            Ok(()) => log::debug!("Scan database persisted after batch"),
            Err(error) => {
                log::warn!("Database persist after batch failed: {}", error);
                outcome
                    .sync_warnings
                    .push(SyncWarning::new(PathBuf::new(), error));
            }
        }
    }

    log::info!("{}", outcome.summary());
    if let Some(cb) = progress {
        cb.on_complete(&outcome);
    }
    outcome
}

/// Run the disk action for one item; `None` when the mode keeps the file.
fn dispose(
    results: &ResultSet,
    index: usize,
    mode: ResolveMode,
    options: &ResolveOptions,
) -> Result<Option<DeleteResult>, DeleteError> {
    let item = results.get_at(index);
    let done = match mode {
        ResolveMode::ListOnly => return Ok(None),
        ResolveMode::Trash => delete_to_trash(&item.path, options.trash_fallback)?,
        ResolveMode::Permanent => permanent_delete(&item.path)?,
        ResolveMode::SymlinkReplace => {
            let keep = results
                .iter()
                .find(|other| other.group_id == item.group_id && !other.checked)
                .ok_or_else(|| DeleteError::NoLinkTarget(item.path.clone()))?;
            replace_with_symlink(&item.path, &keep.path, &options.link_park_suffix)?
        }
    };
    Ok(Some(done))
}
