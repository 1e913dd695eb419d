//! Duplicate group model.
//!
//! This module provides:
//! - [`DuplicateItem`]: one file reported by the scan pipeline
//! - [`ResultSet`]: the ordered, path-unique list of items
//! - Group views and summary counters derived from the set
//! - [`ResultsChange`] notifications for presentation layers
//!
//! # Example
//!
//! ```
//! use dupekeep::duplicates::{DuplicateItem, GroupId, ResultSet};
//! use std::path::PathBuf;
//!
//! let group = GroupId::new();
//! let results = ResultSet::from_items(vec![
//!     DuplicateItem::new(PathBuf::from("/photos/a.jpg"), 1024, group),
//!     DuplicateItem::new(PathBuf::from("/backup/a.jpg"), 1024, group),
//! ])
//! .unwrap();
//!
//! let summary = results.summary();
//! assert_eq!(summary.group_count, 1);
//! assert_eq!(summary.reclaimable_size, 1024);
//! ```

pub mod changes;
pub mod item;
pub mod results;

pub use changes::{ChangeListener, LogListener, ResultsChange};
pub use item::{DuplicateItem, GroupId, MediaKind, Preview};
pub use results::{ResultSet, ResultSummary, ResultsError};
