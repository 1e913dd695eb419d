//! Change notifications for whatever presents the result set.

use std::path::PathBuf;

use super::item::GroupId;
use super::results::ResultSummary;

/// What a command did to the result set.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsChange {
    /// The whole set was replaced (scan completed, import, backup restore).
    Replaced,
    /// Items were removed from the list.
    Removed(Vec<PathBuf>),
    /// A group was excluded and its items removed.
    GroupExcluded {
        /// Excluded group.
        group: GroupId,
        /// Paths that left the list.
        paths: Vec<PathBuf>,
    },
    /// An item now lives at a different path.
    Renamed {
        /// Path before the rename.
        from: PathBuf,
        /// Path after the rename.
        to: PathBuf,
    },
    /// The list was cleared.
    Cleared,
}

impl ResultsChange {
    /// True if the item list itself changed (as opposed to only paths).
    #[must_use]
    pub fn alters_membership(&self) -> bool {
        match self {
            Self::Removed(paths) => !paths.is_empty(),
            Self::GroupExcluded { .. } | Self::Replaced | Self::Cleared => true,
            Self::Renamed { .. } => false,
        }
    }
}

/// Subscriber for result-set changes.
pub trait ChangeListener: Send + Sync {
    /// Called after every committed change with fresh counters.
    fn on_change(&self, change: &ResultsChange, summary: &ResultSummary);
}

/// Listener that forwards changes to the log.
#[derive(Debug, Default)]
pub struct LogListener;

impl ChangeListener for LogListener {
    fn on_change(&self, change: &ResultsChange, summary: &ResultSummary) {
        log::debug!(
            "Result set changed ({:?}): {} item(s) in {} group(s)",
            change,
            summary.item_count,
            summary.group_count
        );
    }
}
