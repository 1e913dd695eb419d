//! The single owner of a result set and everything kept in step with it.
//!
//! A [`Workspace`] bundles the result set, the exclusion ledger, the scan
//! database, the backup artifact and the configuration. Every command is a
//! method that returns an explicit outcome; after a command commits,
//! subscribed [`ChangeListener`]s are told what changed and, when the list
//! itself changed and backup-on-change is enabled, a fresh backup is
//! written.
//!
//! Commands take `&mut self`, so at most one mutation is in flight.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::actions::resolve::{ResolveMode, ResolveRequest};
//! use dupekeep::config::Config;
//! use dupekeep::database::SqliteDatabase;
//! use dupekeep::duplicates::{LogListener, ResultSet};
//! use dupekeep::workspace::{SaveDecision, Workspace};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load();
//! let db = SqliteDatabase::open(&config.database_path())?;
//! let mut workspace = Workspace::open(config, db);
//! workspace.subscribe(Box::new(LogListener));
//!
//! // Hand over a finished scan; excluded groups never show up
//! let hidden = workspace.on_scan_complete(ResultSet::new());
//! println!("{} item(s) hidden by earlier exclusions", hidden.len());
//!
//! workspace.check_all_but_first();
//! let outcome = workspace.resolve(&ResolveRequest::new(ResolveMode::Trash), None, None);
//! println!("{}", outcome.summary());
//!
//! workspace.shutdown(|| SaveDecision::Yes)?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::atomic::AtomicBool;

use crate::actions::rename::{
    ConflictResolver, NewName, RenameCoordinator, RenameError, RenameOptions, RenameOutcome,
    SwapOutcome, SwapSelection,
};
use crate::actions::resolve::{
    resolve_batch, BatchOutcome, ResolveOptions, ResolveProgress, ResolveRequest,
};
use crate::config::{Config, SaveOnExit};
use crate::database::ScanDatabase;
use crate::duplicates::{
    ChangeListener, DuplicateItem, GroupId, ResultSet, ResultSummary, ResultsChange,
};
use crate::exclusion::{ExclusionLedger, LedgerError};
use crate::session::{self, BackupFile, SerializeError};

/// Answer to "save the results before leaving?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    /// Save, then leave.
    Yes,
    /// Leave without saving.
    No,
    /// Stay.
    Cancel,
}

/// What [`Workspace::shutdown`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The backup was written.
    Saved,
    /// Nothing was written.
    NotSaved,
    /// The user chose to stay; the workspace is still usable.
    Cancelled,
}

/// Result set plus ledger, database, backup and configuration.
pub struct Workspace<D: ScanDatabase> {
    results: ResultSet,
    ledger: ExclusionLedger,
    db: D,
    config: Config,
    backup: Option<BackupFile>,
    swap_selection: SwapSelection,
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl<D: ScanDatabase> std::fmt::Debug for Workspace<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("items", &self.results.len())
            .field("ledger_entries", &self.ledger.len())
            .field("backup", &self.backup)
            .finish_non_exhaustive()
    }
}

impl<D: ScanDatabase> Workspace<D> {
    /// Open the workspace described by `config`.
    ///
    /// Loads the exclusion ledger, then restores the backup if there is
    /// one. A backup that cannot be read is logged and skipped.
    pub fn open(config: Config, db: D) -> Self {
        let ledger = ExclusionLedger::load(&config.ledger_path());
        let backup = BackupFile::new(config.backup_path());
        let mut workspace = Self::with_parts(config, db, ledger, Some(backup));
        if let Err(e) = workspace.load_backup() {
            log::warn!("Could not restore the previous results: {}", e);
        }
        workspace
    }

    /// Assemble a workspace from explicit parts. `backup` of `None`
    /// disables backups entirely.
    pub fn with_parts(
        config: Config,
        db: D,
        ledger: ExclusionLedger,
        backup: Option<BackupFile>,
    ) -> Self {
        Self {
            results: ResultSet::new(),
            ledger,
            db,
            config,
            backup,
            swap_selection: SwapSelection::new(),
            listeners: Vec::new(),
        }
    }

    /// Workspace with default settings, an in-memory ledger and no backup.
    pub fn in_memory(db: D) -> Self {
        Self::with_parts(Config::default(), db, ExclusionLedger::in_memory(), None)
    }

    /// Current result set.
    #[must_use]
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// The exclusion ledger.
    #[must_use]
    pub fn ledger(&self) -> &ExclusionLedger {
        &self.ledger
    }

    /// The scan database.
    #[must_use]
    pub fn database(&self) -> &D {
        &self.db
    }

    /// The scan database, mutably.
    pub fn database_mut(&mut self) -> &mut D {
        &mut self.db
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backup artifact, if backups are enabled.
    #[must_use]
    pub fn backup(&self) -> Option<&BackupFile> {
        self.backup.as_ref()
    }

    /// Summary counters for the current result set.
    #[must_use]
    pub fn summary(&self) -> ResultSummary {
        self.results.summary()
    }

    /// Register a change listener.
    ///
    /// Listeners are called in registration order after every commit,
    /// with the summary as it stands after the change.
    pub fn subscribe(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    /// Items designated for the explicit two-item swap.
    #[must_use]
    pub fn swap_selection(&self) -> &SwapSelection {
        &self.swap_selection
    }

    /// Designate the first item of the explicit swap.
    ///
    /// The designation follows the item through renames and swaps and is
    /// dropped when the item leaves the list.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::UnknownItem`] if no item has this path.
    pub fn set_swap_first(&mut self, path: &Path) -> Result<(), RenameError> {
        let item = self.live(path)?;
        self.swap_selection.set_first(item);
        Ok(())
    }

    /// Designate the second item of the explicit swap.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::UnknownItem`] if no item has this path.
    pub fn set_swap_second(&mut self, path: &Path) -> Result<(), RenameError> {
        let item = self.live(path)?;
        self.swap_selection.set_second(item);
        Ok(())
    }

    /// Forget the swap designations.
    pub fn clear_swap_selection(&mut self) {
        self.swap_selection.clear();
    }

    fn live(&self, path: &Path) -> Result<std::path::PathBuf, RenameError> {
        self.results
            .get(path)
            .map(|item| item.path.clone())
            .ok_or_else(|| RenameError::UnknownItem(path.to_path_buf()))
    }

    // ==================== selection ====================

    /// Check or uncheck one item. Returns false for an unknown path.
    pub fn set_checked(&mut self, path: &Path, checked: bool) -> bool {
        self.results.set_checked(path, checked)
    }

    /// Check every member except the first of each group.
    pub fn check_all_but_first(&mut self) {
        self.results.check_all_but_first();
    }

    /// Uncheck every item.
    pub fn uncheck_all(&mut self) {
        self.results.uncheck_all();
    }

    // ==================== commands ====================

    /// Take over the result of a finished scan.
    ///
    /// Groups fully covered by the ledger are hidden before anything is
    /// surfaced; the hidden items are returned.
    pub fn on_scan_complete(&mut self, scanned: ResultSet) -> Vec<DuplicateItem> {
        self.results = scanned;
        let hidden = self.ledger.apply(&mut self.results);
        self.swap_selection.retain_live(&self.results);
        self.committed(ResultsChange::Replaced, true);
        hidden
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.results.clear();
        self.swap_selection.clear();
        self.committed(ResultsChange::Cleared, true);
    }

    /// Exclude a group: record it in the ledger and remove its items.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if the group is unknown or the ledger
    /// could not be saved; the items stay in the list then.
    pub fn exclude_group(&mut self, group: GroupId) -> Result<Vec<DuplicateItem>, LedgerError> {
        let removed = self.ledger.exclude(group, &mut self.results)?;
        self.swap_selection.retain_live(&self.results);
        let paths = removed.iter().map(|item| item.path.clone()).collect();
        self.committed(ResultsChange::GroupExcluded { group, paths }, true);
        Ok(removed)
    }

    /// Rename one item.
    ///
    /// # Arguments
    ///
    /// * `path` - Current path of a listed item
    /// * `new_name` - New base name, or full file name to change the extension
    /// * `resolver` - Asked what to do when the target already exists
    ///
    /// Listeners see a `Removed` change first when an overwrite displaced
    /// another listed item, then the `Renamed` change.
    ///
    /// # Errors
    ///
    /// See [`RenameCoordinator::rename`].
    pub fn rename(
        &mut self,
        path: &Path,
        new_name: NewName,
        resolver: &mut dyn ConflictResolver,
    ) -> Result<RenameOutcome, RenameError> {
        let options = RenameOptions::from(&self.config);
        let outcome = RenameCoordinator::new(&mut self.results, &mut self.db, &options)
            .rename(path, new_name, resolver)?;
        for warning in &outcome.sync_warnings {
            log::warn!("{}", warning);
        }
        if let Some(displaced) = &outcome.displaced {
            self.swap_selection.forget(&displaced.path);
            self.notify(&ResultsChange::Removed(vec![displaced.path.clone()]));
        }
        self.swap_selection.follow(std::slice::from_ref(&outcome.change));
        self.committed(
            ResultsChange::Renamed {
                from: outcome.change.from.clone(),
                to: outcome.change.to.clone(),
            },
            true,
        );
        Ok(outcome)
    }

    /// Swap an item with the only other member of its group.
    ///
    /// # Errors
    ///
    /// See [`RenameCoordinator::swap_in_group`].
    pub fn swap_in_group(&mut self, path: &Path) -> Result<SwapOutcome, RenameError> {
        let options = RenameOptions::from(&self.config);
        let result = RenameCoordinator::new(&mut self.results, &mut self.db, &options)
            .swap_in_group(path);
        self.after_swap(result)
    }

    /// Swap two explicitly named items.
    ///
    /// # Errors
    ///
    /// See [`RenameCoordinator::swap`].
    pub fn swap(&mut self, first: &Path, second: &Path) -> Result<SwapOutcome, RenameError> {
        let options = RenameOptions::from(&self.config);
        let result =
            RenameCoordinator::new(&mut self.results, &mut self.db, &options).swap(first, second);
        self.after_swap(result)
    }

    /// Swap the designated pair and clear the designation on success.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::SwapIncomplete`] unless both items are
    /// designated, plus anything [`RenameCoordinator::swap`] returns.
    pub fn swap_selected(&mut self) -> Result<SwapOutcome, RenameError> {
        let (first, second) = self.swap_selection.pair()?;
        let outcome = self.swap(&first, &second)?;
        self.swap_selection.clear();
        Ok(outcome)
    }

    fn after_swap(
        &mut self,
        result: Result<SwapOutcome, RenameError>,
    ) -> Result<SwapOutcome, RenameError> {
        match result {
            Ok(outcome) => {
                for warning in &outcome.sync_warnings {
                    log::warn!("{}", warning);
                }
                self.swap_selection.follow(&[outcome.first.clone(), outcome.second.clone()]);
                for change in [&outcome.first, &outcome.second] {
                    self.notify(&ResultsChange::Renamed {
                        from: change.from.clone(),
                        to: change.to.clone(),
                    });
                }
                self.backup_after_change();
                Ok(outcome)
            }
            Err(e) => {
                // A failed rollback leaves a parked file whose path the list
                // now tracks; back that up too.
                if matches!(e, RenameError::SwapRollbackFailed { .. }) {
                    self.swap_selection.retain_live(&self.results);
                    self.backup_after_change();
                }
                Err(e)
            }
        }
    }

    /// Run a batch over the checked items.
    ///
    /// # Arguments
    ///
    /// * `request` - Mode, filters and the blacklist flag
    /// * `progress` - Optional per-item callbacks
    /// * `cancel` - Checked between items; a set flag stops the batch
    ///
    /// Per-item failures never abort the batch; they are listed in the
    /// returned outcome and the items stay in the list. A backup is only
    /// written when the list actually changed.
    pub fn resolve(
        &mut self,
        request: &ResolveRequest,
        progress: Option<&dyn ResolveProgress>,
        cancel: Option<&AtomicBool>,
    ) -> BatchOutcome {
        let options = ResolveOptions::from(&self.config);
        let outcome = resolve_batch(
            &mut self.results,
            &mut self.db,
            request,
            &options,
            progress,
            cancel,
        );
        if outcome.changed_list() {
            self.swap_selection.retain_live(&self.results);
            let paths = outcome
                .resolved
                .iter()
                .map(|r| r.item.path.clone())
                .chain(outcome.collapsed.iter().map(|item| item.path.clone()))
                .collect();
            self.committed(ResultsChange::Removed(paths), true);
        }
        outcome
    }

    // ==================== persistence ====================

    /// Export the list as portable JSON.
    ///
    /// # Errors
    ///
    /// Returns an encoding or I/O error.
    pub fn export_json(&self, path: &Path, pretty: bool) -> Result<(), SerializeError> {
        session::write_json(&self.results, path, pretty)
    }

    /// Replace the list with the contents of a portable JSON file.
    ///
    /// When the current list is not empty `confirm` is asked first with
    /// the number of items that would be discarded; a `false` answer
    /// returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns a read, parse or validation error; the current list is
    /// left untouched in that case.
    pub fn import_json<F>(&mut self, path: &Path, confirm: F) -> Result<bool, SerializeError>
    where
        F: FnOnce(usize) -> bool,
    {
        if !self.results.is_empty() && !confirm(self.results.len()) {
            log::info!("Import cancelled");
            return Ok(false);
        }
        let imported = session::read_json(path)?;
        self.results = imported;
        self.swap_selection.clear();
        self.committed(ResultsChange::Replaced, true);
        Ok(true)
    }

    /// Write the backup now.
    ///
    /// # Errors
    ///
    /// Returns an encoding or I/O error. Does nothing when backups are
    /// disabled.
    pub fn save_backup(&self) -> Result<(), SerializeError> {
        match &self.backup {
            Some(backup) => backup.save(&self.results),
            None => Ok(()),
        }
    }

    /// Replace the list with the backup contents.
    ///
    /// Returns `Ok(false)` when there is no backup (missing or empty file).
    ///
    /// # Errors
    ///
    /// Returns the decode error; the list is left untouched then.
    pub fn load_backup(&mut self) -> Result<bool, SerializeError> {
        let Some(backup) = &self.backup else {
            return Ok(false);
        };
        match backup.load()? {
            Some(results) => {
                self.results = results;
                self.swap_selection.retain_live(&self.results);
                self.committed(ResultsChange::Replaced, false);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply the save-on-exit policy.
    ///
    /// # Arguments
    ///
    /// * `ask` - Answers "save before leaving?" for [`SaveOnExit::Ask`]
    ///
    /// `ask` is consulted only for [`SaveOnExit::Ask`] and only when there
    /// is something to save; an empty list is never written.
    ///
    /// # Errors
    ///
    /// Returns the backup error if saving was chosen and failed.
    pub fn shutdown<F>(&mut self, ask: F) -> Result<ShutdownOutcome, SerializeError>
    where
        F: FnOnce() -> SaveDecision,
    {
        if self.results.is_empty() || self.backup.is_none() {
            return Ok(ShutdownOutcome::NotSaved);
        }
        let save = match self.config.save_on_exit {
            SaveOnExit::Never => false,
            SaveOnExit::Always => true,
            SaveOnExit::Ask => match ask() {
                SaveDecision::Yes => true,
                SaveDecision::No => false,
                SaveDecision::Cancel => return Ok(ShutdownOutcome::Cancelled),
            },
        };
        if !save {
            return Ok(ShutdownOutcome::NotSaved);
        }
        self.save_backup()?;
        if let Err(e) = self.db.persist() {
            log::warn!("Scan database not saved on exit: {}", e);
        }
        Ok(ShutdownOutcome::Saved)
    }

    // ==================== internals ====================

    fn notify(&self, change: &ResultsChange) {
        if self.listeners.is_empty() {
            return;
        }
        let summary = self.results.summary();
        for listener in &self.listeners {
            listener.on_change(change, &summary);
        }
    }

    fn committed(&mut self, change: ResultsChange, back_up: bool) {
        self.notify(&change);
        if back_up {
            self.backup_after_change();
        }
    }

    fn backup_after_change(&self) {
        if !self.config.backup_after_change {
            return;
        }
        if let Err(e) = self.save_backup() {
            log::warn!("Backup after change failed: {}", e);
        }
    }
}
