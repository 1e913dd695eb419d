//! Single-file renames and two-file name swaps.
//!
//! Both operations are driven as explicit state machines so every
//! intermediate state has a defined rollback. The in-memory item path is
//! updated right after each physical move succeeds, before the database is
//! touched, so it always names the file that is actually on disk.
//!
//! A database failure after a successful move does not fail the operation:
//! it is returned as a [`SyncWarning`] inside the outcome.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::actions::rename::{ConflictDecision, NewName, RenameCoordinator, RenameOptions};
//! use dupekeep::database::MemoryDatabase;
//! use dupekeep::duplicates::ResultSet;
//! use std::path::Path;
//!
//! let mut results = ResultSet::new();
//! let mut db = MemoryDatabase::new();
//! let options = RenameOptions::default();
//! let mut coordinator = RenameCoordinator::new(&mut results, &mut db, &options);
//!
//! let outcome = coordinator.rename(
//!     Path::new("/photos/IMG_0001.jpg"),
//!     NewName::stem("beach"),
//!     &mut |_: &Path| ConflictDecision::Cancel,
//! );
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::SyncWarning;
use crate::config::Config;
use crate::database::ScanDatabase;
use crate::duplicates::{DuplicateItem, GroupId, ResultSet};
use crate::error::ErrorKind;
use crate::paths::{
    file_stem_string, path_key, paths_equal, sibling_with_stem, validate_file_stem, with_suffix,
    StemProblem,
};

/// Errors from rename and swap operations.
#[derive(Debug, Error)]
pub enum RenameError {
    /// The new name is empty.
    #[error("new name is empty")]
    EmptyName,

    /// The new name is not a plain file name.
    #[error("invalid file name '{0}': must not contain path separators")]
    InvalidName(String),

    /// The new name resolves to the current path.
    #[error("new name is the same as the current name: {0}")]
    NameUnchanged(PathBuf),

    /// The path is not a live item of the result set.
    #[error("not in the result set: {0}")]
    UnknownItem(PathBuf),

    /// The target exists and overwriting was not confirmed.
    #[error("target already exists: {0}")]
    TargetExists(PathBuf),

    /// The physical rename failed; nothing was changed.
    #[error("failed to rename {from} to {to}: {source}")]
    Filesystem {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Swap was asked to exchange an item with itself.
    #[error("cannot swap an item with itself: {0}")]
    SwapSameItem(PathBuf),

    /// Both items already share a base name.
    #[error("both items are already named '{0}'")]
    SwapSameStem(String),

    /// Inferred swap on a group that does not have exactly two members.
    #[error(
        "group {group} has {count} members; pick the first and second item explicitly to swap"
    )]
    SwapGroupSize { group: GroupId, count: usize },

    /// Swap selection is missing one of its items.
    #[error("swap needs both a first and a second item")]
    SwapIncomplete,

    /// A swap step failed and every completed step was undone.
    #[error("swap step {step} failed and was rolled back: {source}")]
    SwapRolledBack {
        step: SwapStep,
        #[source]
        source: io::Error,
    },

    /// A swap step failed and at least one undo failed too. Every file
    /// that could not be moved back is listed in `stranded`, and the result
    /// set already points at those paths.
    #[error(
        "swap step {step} failed ({error}) and rollback failed ({}); left at {}",
        join_errors(.rollback_errors),
        join_paths(.stranded)
    )]
    SwapRollbackFailed {
        step: SwapStep,
        error: io::Error,
        rollback_errors: Vec<io::Error>,
        stranded: Vec<PathBuf>,
    },
}

impl RenameError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Filesystem { .. }
            | Self::SwapRolledBack { .. }
            | Self::SwapRollbackFailed { .. } => ErrorKind::Filesystem,
            _ => ErrorKind::Validation,
        }
    }
}

fn join_errors(errors: &[io::Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Settings consumed by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOptions {
    /// Suffix appended to the parked file during a swap.
    pub swap_temp_suffix: String,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            swap_temp_suffix: ".dkswap".to_string(),
        }
    }
}

impl From<&Config> for RenameOptions {
    fn from(config: &Config) -> Self {
        Self {
            swap_temp_suffix: config.swap_temp_suffix.clone(),
        }
    }
}

/// How the user spelled the new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewName {
    /// Base name only; the current extension is kept.
    Stem(String),
    /// Full file name including extension.
    FileName(String),
}

impl NewName {
    /// Base name only, keeping the current extension.
    pub fn stem(name: impl Into<String>) -> Self {
        Self::Stem(name.into())
    }

    /// Full file name, extension included.
    pub fn file_name(name: impl Into<String>) -> Self {
        Self::FileName(name.into())
    }

    fn with_text(&self, text: String) -> Self {
        match self {
            Self::Stem(_) => Self::Stem(text),
            Self::FileName(_) => Self::FileName(text),
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Stem(s) | Self::FileName(s) => s,
        }
    }

    fn resolve(&self, current: &Path) -> Result<PathBuf, RenameError> {
        validate_file_stem(self.text()).map_err(|problem| match problem {
            StemProblem::Empty => RenameError::EmptyName,
            StemProblem::NotAFileName => RenameError::InvalidName(self.text().to_string()),
        })?;
        let target = match self {
            Self::Stem(stem) => sibling_with_stem(current, stem),
            Self::FileName(name) => current.with_file_name(name),
        };
        if paths_equal(&target, current) {
            return Err(RenameError::NameUnchanged(current.to_path_buf()));
        }
        Ok(target)
    }
}

/// Answer to an existing rename target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Replace the existing file.
    Overwrite,
    /// Try again with a different name, spelled like the original request.
    Retry(String),
    /// Give up.
    Cancel,
}

/// Asked when a rename target already exists.
pub trait ConflictResolver {
    /// Decide what to do about `target`.
    fn resolve_conflict(&mut self, target: &Path) -> ConflictDecision;
}

impl<F> ConflictResolver for F
where
    F: FnMut(&Path) -> ConflictDecision,
{
    fn resolve_conflict(&mut self, target: &Path) -> ConflictDecision {
        self(target)
    }
}

/// One path change applied to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    /// Path before the operation.
    pub from: PathBuf,
    /// Path after the operation.
    pub to: PathBuf,
}

/// Result of a successful rename.
#[derive(Debug)]
pub struct RenameOutcome {
    /// The applied change.
    pub change: PathChange,
    /// Item whose file was overwritten, if the target was another item.
    pub displaced: Option<DuplicateItem>,
    /// Database failures that happened after the file was moved.
    pub sync_warnings: Vec<SyncWarning>,
}

/// Result of a successful swap.
#[derive(Debug)]
pub struct SwapOutcome {
    /// Change applied to the first item.
    pub first: PathChange,
    /// Change applied to the second item.
    pub second: PathChange,
    /// Database failures that happened after a file was moved.
    pub sync_warnings: Vec<SyncWarning>,
}

/// States of a single rename.
#[derive(Debug)]
enum RenameState {
    Requested(NewName),
    NameValidated { target: PathBuf, overwrite: bool },
    Renamed {
        target: PathBuf,
        indexed: Option<bool>,
        overwrote: bool,
    },
    DatabaseUpdated { target: PathBuf },
    Committed { target: PathBuf },
}

/// The three physical moves of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    /// Second item moved to its temporary name.
    ParkSecond,
    /// First item moved to its new name.
    MoveFirst,
    /// Parked second item moved to its new name.
    PlaceSecond,
}

impl std::fmt::Display for SwapStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParkSecond => write!(f, "1 (park second)"),
            Self::MoveFirst => write!(f, "2 (move first)"),
            Self::PlaceSecond => write!(f, "3 (place second)"),
        }
    }
}

/// Where a swap stands; each state knows how to undo itself.
#[derive(Debug)]
enum SwapState {
    Pending,
    SecondParked,
    FirstMoved,
    Done,
}

/// The planned paths of a swap.
#[derive(Debug, Clone)]
struct SwapPlan {
    first: PathBuf,
    second: PathBuf,
    first_target: PathBuf,
    second_target: PathBuf,
    parked: PathBuf,
}

/// Explicitly designated first and second items for a swap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapSelection {
    first: Option<PathBuf>,
    second: Option<PathBuf>,
}

impl SwapSelection {
    /// Empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Designate the first item.
    pub fn set_first(&mut self, path: PathBuf) {
        self.first = Some(path);
    }

    /// Designate the second item.
    pub fn set_second(&mut self, path: PathBuf) {
        self.second = Some(path);
    }

    /// Currently designated first item.
    #[must_use]
    pub fn first(&self) -> Option<&Path> {
        self.first.as_deref()
    }

    /// Currently designated second item.
    #[must_use]
    pub fn second(&self) -> Option<&Path> {
        self.second.as_deref()
    }

    /// True once both items are designated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }

    /// Forget both designations.
    pub fn clear(&mut self) {
        self.first = None;
        self.second = None;
    }

    /// Move designations along with items whose paths changed.
    ///
    /// All `changes` apply at once, so a swap that exchanges two paths
    /// moves each designation exactly one step.
    pub fn follow(&mut self, changes: &[PathChange]) {
        for slot in [&mut self.first, &mut self.second] {
            let moved = slot.as_deref().and_then(|current| {
                changes
                    .iter()
                    .find(|change| paths_equal(&change.from, current))
                    .map(|change| change.to.clone())
            });
            if let Some(to) = moved {
                *slot = Some(to);
            }
        }
    }

    /// Forget any designation of `path`.
    pub fn forget(&mut self, path: &Path) {
        for slot in [&mut self.first, &mut self.second] {
            if slot.as_deref().is_some_and(|p| paths_equal(p, path)) {
                *slot = None;
            }
        }
    }

    /// Drop designations whose items have left `results`.
    pub fn retain_live(&mut self, results: &ResultSet) {
        for slot in [&mut self.first, &mut self.second] {
            if slot.as_deref().is_some_and(|p| !results.contains_path(p)) {
                *slot = None;
            }
        }
    }

    /// Both designations, if complete.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::SwapIncomplete`] if either is missing.
    pub fn pair(&self) -> Result<(PathBuf, PathBuf), RenameError> {
        match (&self.first, &self.second) {
            (Some(a), Some(b)) => Ok((a.clone(), b.clone())),
            _ => Err(RenameError::SwapIncomplete),
        }
    }
}

/// Applies renames and swaps to the result set, the disk and the database.
pub struct RenameCoordinator<'a, D: ScanDatabase + ?Sized> {
    results: &'a mut ResultSet,
    db: &'a mut D,
    options: &'a RenameOptions,
}

impl<'a, D: ScanDatabase + ?Sized> RenameCoordinator<'a, D> {
    /// Borrow the state a rename needs.
    pub fn new(results: &'a mut ResultSet, db: &'a mut D, options: &'a RenameOptions) -> Self {
        Self {
            results,
            db,
            options,
        }
    }

    /// Rename one item in place.
    ///
    /// When the target exists, `resolver` decides between overwriting,
    /// retrying with another name, or cancelling.
    ///
    /// # Errors
    ///
    /// Validation errors leave everything untouched. A failed physical
    /// rename returns [`RenameError::Filesystem`] with nothing changed.
    pub fn rename(
        &mut self,
        path: &Path,
        new_name: NewName,
        resolver: &mut dyn ConflictResolver,
    ) -> Result<RenameOutcome, RenameError> {
        let current = self.live_path(path)?;
        let mut warnings = Vec::new();
        let mut displaced = None;
        let spelling = new_name.clone();
        let mut state = RenameState::Requested(new_name);

        loop {
            log::trace!("rename {}: {:?}", current.display(), state);
            state = match state {
                RenameState::Requested(name) => RenameState::NameValidated {
                    target: name.resolve(&current)?,
                    overwrite: false,
                },
                RenameState::NameValidated { target, overwrite } => {
                    if !overwrite && target_taken(&target) {
                        match resolver.resolve_conflict(&target) {
                            ConflictDecision::Overwrite => RenameState::NameValidated {
                                target,
                                overwrite: true,
                            },
                            ConflictDecision::Retry(text) => {
                                RenameState::Requested(spelling.with_text(text))
                            }
                            ConflictDecision::Cancel => {
                                return Err(RenameError::TargetExists(target))
                            }
                        }
                    } else {
                        // None when unknown; the re-key is attempted then
                        let indexed = match self.db.lookup(&current) {
                            Ok(entry) => Some(entry.is_some()),
                            Err(e) => {
                                log::warn!(
                                    "Database lookup for {} failed: {}",
                                    current.display(),
                                    e
                                );
                                None
                            }
                        };
                        fs::rename(&current, &target).map_err(|source| {
                            log::warn!(
                                "Rename {} -> {} failed: {}",
                                current.display(),
                                target.display(),
                                source
                            );
                            RenameError::Filesystem {
                                from: current.clone(),
                                to: target.clone(),
                                source,
                            }
                        })?;
                        log::info!("Renamed {} -> {}", current.display(), target.display());
                        displaced = self.repoint(&current, &target);
                        RenameState::Renamed {
                            target,
                            indexed,
                            overwrote: overwrite,
                        }
                    }
                }
                RenameState::Renamed {
                    target,
                    indexed,
                    overwrote,
                } => {
                    if indexed == Some(false) {
                        log::debug!("No database entry for {}", current.display());
                        if overwrote {
                            self.forget_entry(&target, &mut warnings);
                        }
                    } else {
                        self.rekey(&current, &target, &mut warnings);
                    }
                    RenameState::DatabaseUpdated { target }
                }
                RenameState::DatabaseUpdated { target } => {
                    self.persist(&mut warnings);
                    RenameState::Committed { target }
                }
                RenameState::Committed { target } => {
                    return Ok(RenameOutcome {
                        change: PathChange {
                            from: current,
                            to: target,
                        },
                        displaced,
                        sync_warnings: warnings,
                    });
                }
            };
        }
    }

    /// Exchange the base names of two live items.
    ///
    /// Each keeps its own directory and extension. The second item is
    /// parked under a temporary name so the two targets never collide.
    ///
    /// # Errors
    ///
    /// Validation errors leave everything untouched. A failed step is
    /// rolled back ([`RenameError::SwapRolledBack`]); if the rollback
    /// fails too, [`RenameError::SwapRollbackFailed`] names every file
    /// that was left behind.
    pub fn swap(&mut self, first: &Path, second: &Path) -> Result<SwapOutcome, RenameError> {
        let plan = self.plan_swap(first, second)?;
        let mut warnings = Vec::new();
        let mut state = SwapState::Pending;

        loop {
            log::trace!("swap {}: {:?}", plan.first.display(), state);
            state = match state {
                SwapState::Pending => {
                    self.swap_step(&plan, SwapStep::ParkSecond, &mut warnings)?;
                    SwapState::SecondParked
                }
                SwapState::SecondParked => {
                    self.swap_step(&plan, SwapStep::MoveFirst, &mut warnings)?;
                    SwapState::FirstMoved
                }
                SwapState::FirstMoved => {
                    self.swap_step(&plan, SwapStep::PlaceSecond, &mut warnings)?;
                    SwapState::Done
                }
                SwapState::Done => {
                    self.persist(&mut warnings);
                    return Ok(SwapOutcome {
                        first: PathChange {
                            from: plan.first,
                            to: plan.first_target,
                        },
                        second: PathChange {
                            from: plan.second,
                            to: plan.second_target,
                        },
                        sync_warnings: warnings,
                    });
                }
            };
        }
    }

    /// Swap an item with the only other member of its group.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::SwapGroupSize`] unless the group has exactly
    /// two members, plus anything [`Self::swap`] returns.
    pub fn swap_in_group(&mut self, path: &Path) -> Result<SwapOutcome, RenameError> {
        let current = self.live_path(path)?;
        let group = self
            .results
            .get(&current)
            .map(|item| item.group_id)
            .ok_or_else(|| RenameError::UnknownItem(current.clone()))?;
        let members = self.results.group_paths(group);
        if members.len() != 2 {
            return Err(RenameError::SwapGroupSize {
                group,
                count: members.len(),
            });
        }
        self.swap(&members[0], &members[1])
    }

    /// Swap the designated pair.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::SwapIncomplete`] if either item is missing,
    /// plus anything [`Self::swap`] returns.
    pub fn swap_selection(&mut self, selection: &SwapSelection) -> Result<SwapOutcome, RenameError> {
        let (first, second) = selection.pair()?;
        self.swap(&first, &second)
    }

    fn live_path(&self, path: &Path) -> Result<PathBuf, RenameError> {
        self.results
            .get(path)
            .map(|item| item.path.clone())
            .ok_or_else(|| RenameError::UnknownItem(path.to_path_buf()))
    }

    fn plan_swap(&self, first: &Path, second: &Path) -> Result<SwapPlan, RenameError> {
        let first = self.live_path(first)?;
        let second = self.live_path(second)?;
        if paths_equal(&first, &second) {
            return Err(RenameError::SwapSameItem(first));
        }
        let first_stem = file_stem_string(&first);
        let second_stem = file_stem_string(&second);
        if path_key(Path::new(&first_stem)) == path_key(Path::new(&second_stem)) {
            return Err(RenameError::SwapSameStem(first_stem));
        }

        let first_target = sibling_with_stem(&first, &second_stem);
        let second_target = sibling_with_stem(&second, &first_stem);
        let parked = with_suffix(&second_target, &self.options.swap_temp_suffix);

        // The only targets allowed to exist are the swapped files themselves.
        for target in [&first_target, &second_target] {
            if target_taken(target) && !paths_equal(target, &first) && !paths_equal(target, &second)
            {
                return Err(RenameError::TargetExists(target.clone()));
            }
        }
        if target_taken(&parked) {
            return Err(RenameError::TargetExists(parked));
        }

        Ok(SwapPlan {
            first,
            second,
            first_target,
            second_target,
            parked,
        })
    }

    fn swap_step(
        &mut self,
        plan: &SwapPlan,
        step: SwapStep,
        warnings: &mut Vec<SyncWarning>,
    ) -> Result<(), RenameError> {
        let (from, to) = match step {
            SwapStep::ParkSecond => (&plan.second, &plan.parked),
            SwapStep::MoveFirst => (&plan.first, &plan.first_target),
            SwapStep::PlaceSecond => (&plan.parked, &plan.second_target),
        };
        let error = match self.move_item(from, to, warnings) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        log::warn!("Swap step {} failed: {}", step, error);

        // Undo completed moves, newest first.
        let undo: Vec<(&PathBuf, &PathBuf)> = match step {
            SwapStep::ParkSecond => Vec::new(),
            SwapStep::MoveFirst => vec![(&plan.parked, &plan.second)],
            SwapStep::PlaceSecond => vec![
                (&plan.first_target, &plan.first),
                (&plan.parked, &plan.second),
            ],
        };
        if undo.is_empty() {
            return Err(RenameError::Filesystem {
                from: from.clone(),
                to: to.clone(),
                source: error,
            });
        }
        // Each undo is tried on its own so one failure never strands the
        // parked file when its original spot is still free.
        let mut rollback_errors = Vec::new();
        let mut stranded = Vec::new();
        for (back_from, back_to) in undo {
            let result = if target_taken(back_to) {
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is occupied", back_to.display()),
                ))
            } else {
                self.move_item(back_from, back_to, warnings)
            };
            if let Err(rollback_error) = result {
                log::error!(
                    "Swap rollback {} -> {} failed: {}; file left at {}",
                    back_from.display(),
                    back_to.display(),
                    rollback_error,
                    back_from.display()
                );
                rollback_errors.push(rollback_error);
                stranded.push(back_from.clone());
            }
        }
        if !rollback_errors.is_empty() {
            self.persist(warnings);
            return Err(RenameError::SwapRollbackFailed {
                step,
                error,
                rollback_errors,
                stranded,
            });
        }
        log::warn!("Swap of {} and {} rolled back", plan.first.display(), plan.second.display());
        self.persist(warnings);
        Err(RenameError::SwapRolledBack {
            step,
            source: error,
        })
    }

    /// Move a file, then update the item and the database to match.
    fn move_item(
        &mut self,
        from: &Path,
        to: &Path,
        warnings: &mut Vec<SyncWarning>,
    ) -> io::Result<()> {
        fs::rename(from, to)?;
        log::info!("Moved {} -> {}", from.display(), to.display());
        self.repoint(from, to);
        self.rekey(from, to, warnings);
        Ok(())
    }

    fn repoint(&mut self, from: &Path, to: &Path) -> Option<DuplicateItem> {
        let index = self.results.position(from)?;
        let displaced = self.results.set_path_at(index, to.to_path_buf());
        if let Some(item) = &displaced {
            log::info!("{} was overwritten and left the result set", item.path.display());
        }
        displaced
    }

    fn rekey(&mut self, from: &Path, to: &Path, warnings: &mut Vec<SyncWarning>) {
        match self.db.rekey(from, to) {
            Ok(true) => log::debug!("Database re-keyed {} -> {}", from.display(), to.display()),
            Ok(false) => log::debug!("No database entry for {}", from.display()),
            Err(error) => {
                log::warn!(
                    "Database re-key {} -> {} failed: {}",
                    from.display(),
                    to.display(),
                    error
                );
                warnings.push(SyncWarning::new(to.to_path_buf(), error));
            }
        }
    }

    /// Drop the entry of a file that was overwritten.
    fn forget_entry(&mut self, path: &Path, warnings: &mut Vec<SyncWarning>) {
        match self.db.remove(path) {
            Ok(true) => log::debug!("Dropped database entry of overwritten {}", path.display()),
            Ok(false) => {}
            Err(error) => {
                log::warn!("Database remove {} failed: {}", path.display(), error);
                warnings.push(SyncWarning::new(path.to_path_buf(), error));
            }
        }
    }

    fn persist(&mut self, warnings: &mut Vec<SyncWarning>) {
        if let Err(error) = self.db.persist() {
            log::warn!("Database persist failed: {}", error);
            warnings.push(SyncWarning::new(PathBuf::new(), error));
        }
    }
}

fn target_taken(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
