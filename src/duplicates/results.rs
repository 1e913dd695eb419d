//! The ordered result set and the group views derived from it.
//!
//! Groups are never materialized: a group is every item sharing a
//! [`GroupId`]. The only structural invariant the set enforces is path
//! uniqueness, checked with NFC-normalized keys.
//!
//! # Example
//!
//! ```
//! use dupekeep::duplicates::{DuplicateItem, GroupId, ResultSet};
//! use std::path::PathBuf;
//!
//! let group = GroupId::new();
//! let mut results = ResultSet::from_items(vec![
//!     DuplicateItem::new(PathBuf::from("/photos/a.jpg"), 2_000, group),
//!     DuplicateItem::new(PathBuf::from("/photos/a (1).jpg"), 1_500, group),
//! ])
//! .unwrap();
//!
//! results.check_all_but_first();
//! let summary = results.summary();
//! assert_eq!(summary.group_count, 1);
//! assert_eq!(summary.checked_count, 1);
//! assert_eq!(summary.reclaimable_size, 1_500);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::item::{DuplicateItem, GroupId};
use crate::error::ErrorKind;
use crate::paths::{path_key, paths_equal};

/// Errors raised when the path-uniqueness invariant would break.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Two items would share a path.
    #[error("duplicate path in result set: {0}")]
    DuplicatePath(PathBuf),
}

impl ResultsError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Summary counters recomputed after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    /// Number of items.
    pub item_count: usize,
    /// Number of distinct groups.
    pub group_count: usize,
    /// Sum of item sizes in bytes.
    pub total_size: u64,
    /// Bytes freed by keeping only the largest member of each group.
    pub reclaimable_size: u64,
    /// Number of checked items.
    pub checked_count: usize,
}

/// Ordered sequence of duplicate items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    items: Vec<DuplicateItem>,
}

impl ResultSet {
    /// Create an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a result set, rejecting any repeated path.
    ///
    /// Order is kept as given; it is the display order every other
    /// operation works in.
    ///
    /// # Arguments
    ///
    /// * `items` - Scan results in display order
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError::DuplicatePath`] for the first repeated path.
    pub fn from_items(items: Vec<DuplicateItem>) -> Result<Self, ResultsError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(path_key(&item.path)) {
                return Err(ResultsError::DuplicatePath(item.path.clone()));
            }
        }
        Ok(Self { items })
    }

    /// All items in display order.
    #[must_use]
    pub fn items(&self) -> &[DuplicateItem] {
        &self.items
    }

    /// Consume the set and return its items.
    #[must_use]
    pub fn into_items(self) -> Vec<DuplicateItem> {
        self.items
    }

    /// Iterate over items in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, DuplicateItem> {
        self.items.iter()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Append an item.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError::DuplicatePath`] if the path is already present.
    pub fn push(&mut self, item: DuplicateItem) -> Result<(), ResultsError> {
        if self.contains_path(&item.path) {
            return Err(ResultsError::DuplicatePath(item.path));
        }
        self.items.push(item);
        Ok(())
    }

    /// Index of the item with this path.
    #[must_use]
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.items.iter().position(|i| paths_equal(&i.path, path))
    }

    /// True if an item has this path.
    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.position(path).is_some()
    }

    /// Item with this path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&DuplicateItem> {
        self.position(path).map(|i| &self.items[i])
    }

    pub(crate) fn get_at(&self, index: usize) -> &DuplicateItem {
        &self.items[index]
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> DuplicateItem {
        self.items.remove(index)
    }

    /// Point the item at `index` to a new on-disk path.
    ///
    /// Any other item already holding `new_path` is dropped first: its file
    /// was just overwritten, so it no longer exists as a separate item.
    /// Returns the dropped item, if any.
    pub(crate) fn set_path_at(&mut self, index: usize, new_path: PathBuf) -> Option<DuplicateItem> {
        let clash = self
            .items
            .iter()
            .enumerate()
            .find(|(i, item)| *i != index && paths_equal(&item.path, &new_path))
            .map(|(i, _)| i);
        let mut target = index;
        let displaced = clash.map(|i| {
            if i < index {
                target -= 1;
            }
            self.items.remove(i)
        });
        self.items[target].path = new_path;
        displaced
    }

    /// Remove the item with this path.
    pub fn remove_path(&mut self, path: &Path) -> Option<DuplicateItem> {
        self.position(path).map(|i| self.items.remove(i))
    }

    /// Remove every item matching `predicate`, returning them in order.
    pub fn extract_if<F>(&mut self, mut predicate: F) -> Vec<DuplicateItem>
    where
        F: FnMut(&DuplicateItem) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        removed
    }

    /// Distinct group identifiers in first-seen order.
    #[must_use]
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter(|i| seen.insert(i.group_id))
            .map(|i| i.group_id)
            .collect()
    }

    /// Members of one group in display order.
    #[must_use]
    pub fn group_members(&self, group: GroupId) -> Vec<&DuplicateItem> {
        self.items.iter().filter(|i| i.group_id == group).collect()
    }

    /// Paths of one group's members.
    #[must_use]
    pub fn group_paths(&self, group: GroupId) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter(|i| i.group_id == group)
            .map(|i| i.path.clone())
            .collect()
    }

    /// Member count per group.
    #[must_use]
    pub fn group_sizes(&self) -> HashMap<GroupId, usize> {
        let mut sizes = HashMap::new();
        for item in &self.items {
            *sizes.entry(item.group_id).or_insert(0) += 1;
        }
        sizes
    }

    /// Set the checked flag of one item.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the item; matched with NFC-normalized keys
    /// * `checked` - New value of the flag
    ///
    /// Returns false if no item has this path.
    pub fn set_checked(&mut self, path: &Path, checked: bool) -> bool {
        match self.position(path) {
            Some(i) => {
                self.items[i].checked = checked;
                true
            }
            None => false,
        }
    }

    /// Uncheck everything.
    pub fn uncheck_all(&mut self) {
        for item in &mut self.items {
            item.checked = false;
        }
    }

    /// Uncheck every checked item matching `predicate`. Returns how many
    /// items changed.
    pub fn uncheck_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&DuplicateItem) -> bool,
    {
        let mut changed = 0;
        for item in &mut self.items {
            if item.checked && predicate(item) {
                item.checked = false;
                changed += 1;
            }
        }
        changed
    }

    /// Check every member except the first of each group.
    ///
    /// "First" is display order, so the item a scan listed first is the
    /// one kept. Earlier check marks are overwritten.
    ///
    /// # Example
    ///
    /// ```
    /// use dupekeep::duplicates::{DuplicateItem, GroupId, ResultSet};
    /// use std::path::{Path, PathBuf};
    ///
    /// let g = GroupId::new();
    /// let mut results = ResultSet::from_items(vec![
    ///     DuplicateItem::new(PathBuf::from("/a.jpg"), 1, g),
    ///     DuplicateItem::new(PathBuf::from("/b.jpg"), 1, g),
    /// ])
    /// .unwrap();
    /// results.check_all_but_first();
    /// assert!(!results.get(Path::new("/a.jpg")).unwrap().checked);
    /// assert!(results.get(Path::new("/b.jpg")).unwrap().checked);
    /// ```
    pub fn check_all_but_first(&mut self) {
        let mut seen = HashSet::new();
        for item in &mut self.items {
            item.checked = !seen.insert(item.group_id);
        }
    }

    /// Remove every item left alone in its group.
    ///
    /// A group of one is not a duplicate group any more.
    pub fn collapse_singletons(&mut self) -> Vec<DuplicateItem> {
        let sizes = self.group_sizes();
        self.extract_if(|item| sizes.get(&item.group_id).copied() == Some(1))
    }

    /// Items ordered by group identifier, display order within a group.
    #[must_use]
    pub fn sorted_by_group(&self) -> Vec<&DuplicateItem> {
        let mut sorted: Vec<&DuplicateItem> = self.items.iter().collect();
        sorted.sort_by_key(|i| i.group_id);
        sorted
    }

    /// Compute the summary counters.
    ///
    /// Reclaimable bytes assume the largest member of each group is kept,
    /// whatever is checked.
    #[must_use]
    pub fn summary(&self) -> ResultSummary {
        let mut largest: BTreeMap<GroupId, u64> = BTreeMap::new();
        let mut summary = ResultSummary::default();
        for item in &self.items {
            summary.item_count += 1;
            summary.total_size += item.size;
            if item.checked {
                summary.checked_count += 1;
            }
            let entry = largest.entry(item.group_id).or_insert(0);
            *entry = (*entry).max(item.size);
        }
        summary.group_count = largest.len();
        summary.reclaimable_size = summary
            .total_size
            .saturating_sub(largest.values().sum::<u64>());
        summary
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a DuplicateItem;
    type IntoIter = std::slice::Iter<'a, DuplicateItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
