use dupekeep::actions::rename::{
    RenameCoordinator, RenameError, RenameOptions, SwapSelection, SwapStep,
};
use dupekeep::database::{DatabaseEntry, DatabaseResult, MemoryDatabase, ScanDatabase};
use dupekeep::duplicates::{DuplicateItem, GroupId, ResultSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Memory database that runs a callback after every re-key, letting a
/// test change the filesystem between two swap steps.
struct HookedDatabase<F: FnMut(&Path)> {
    inner: MemoryDatabase,
    on_rekey: F,
}

impl<F: FnMut(&Path)> ScanDatabase for HookedDatabase<F> {
    fn lookup(&self, path: &Path) -> DatabaseResult<Option<DatabaseEntry>> {
        self.inner.lookup(path)
    }

    fn rekey(&mut self, old: &Path, new: &Path) -> DatabaseResult<bool> {
        let moved = self.inner.rekey(old, new)?;
        (self.on_rekey)(new);
        Ok(moved)
    }

    fn remove(&mut self, path: &Path) -> DatabaseResult<bool> {
        self.inner.remove(path)
    }

    fn blacklist(&mut self, path: &Path) -> DatabaseResult<()> {
        self.inner.blacklist(path)
    }

    fn persist(&mut self) -> DatabaseResult<()> {
        self.inner.persist()
    }
}

/// True when directory permissions are not enforced (running as root).
#[cfg(unix)]
fn permissions_ignored(dir: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
    let marker = dir.join(".write-check");
    let ignored = fs::write(&marker, b"").is_ok();
    let _ = fs::remove_file(&marker);
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    ignored
}

/// `left/a.jpg` (first) and `right/b.png` (second), each in its own group.
fn cross_directory_pair(root: &Path) -> (PathBuf, PathBuf, ResultSet) {
    let left = root.join("left");
    let right = root.join("right");
    fs::create_dir(&left).unwrap();
    fs::create_dir(&right).unwrap();
    let first = left.join("a.jpg");
    let second = right.join("b.png");
    fs::write(&first, b"A").unwrap();
    fs::write(&second, b"B").unwrap();
    let results = ResultSet::from_items(vec![
        DuplicateItem::new(first.clone(), 1, GroupId::new()),
        DuplicateItem::new(second.clone(), 1, GroupId::new()),
    ])
    .unwrap();
    (first, second, results)
}

#[test]
fn test_swap_exchanges_names_across_directories() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    fs::create_dir(&left).unwrap();
    fs::create_dir(&right).unwrap();

    let first = left.join("original.jpg");
    let second = right.join("IMG_0001.png");
    fs::write(&first, b"first").unwrap();
    fs::write(&second, b"second").unwrap();

    // Different groups are allowed for an explicit swap
    let mut results = ResultSet::from_items(vec![
        DuplicateItem::new(first.clone(), 5, GroupId::new()),
        DuplicateItem::new(second.clone(), 6, GroupId::new()),
    ])
    .unwrap();
    let mut db = MemoryDatabase::new();
    db.insert(first.clone(), DatabaseEntry::new(vec![1]));
    db.insert(second.clone(), DatabaseEntry::new(vec![2]));

    let mut selection = SwapSelection::new();
    selection.set_first(first.clone());
    selection.set_second(second.clone());
    let outcome = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .swap_selection(&selection)
        .unwrap();

    let new_first = left.join("IMG_0001.jpg");
    let new_second = right.join("original.png");
    assert_eq!(outcome.first.to, new_first);
    assert_eq!(outcome.second.to, new_second);
    assert_eq!(fs::read(&new_first).unwrap(), b"first");
    assert_eq!(fs::read(&new_second).unwrap(), b"second");
    assert!(!first.exists());
    assert!(!second.exists());

    assert_eq!(db.lookup(&new_first).unwrap(), Some(DatabaseEntry::new(vec![1])));
    assert_eq!(db.lookup(&new_second).unwrap(), Some(DatabaseEntry::new(vec![2])));
    assert!(results.contains_path(&new_first));
    assert!(results.contains_path(&new_second));

    // No parked file left behind
    let leftovers: Vec<PathBuf> = fs::read_dir(&right)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(leftovers, vec![new_second]);
}

#[test]
fn test_swap_twice_restores_names() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.mp4");
    let b = dir.path().join("b.mp4");
    fs::write(&a, b"A").unwrap();
    fs::write(&b, b"B").unwrap();
    let g = GroupId::new();
    let mut results = ResultSet::from_items(vec![
        DuplicateItem::new(a.clone(), 1, g),
        DuplicateItem::new(b.clone(), 1, g),
    ])
    .unwrap();
    let mut db = MemoryDatabase::new();
    let options = RenameOptions::default();

    RenameCoordinator::new(&mut results, &mut db, &options)
        .swap_in_group(&a)
        .unwrap();
    assert_eq!(fs::read(&a).unwrap(), b"B");

    RenameCoordinator::new(&mut results, &mut db, &options)
        .swap_in_group(&b)
        .unwrap();
    assert_eq!(fs::read(&a).unwrap(), b"A");
    assert_eq!(fs::read(&b).unwrap(), b"B");
}

#[test]
fn test_inferred_swap_requires_two_members() {
    let g = GroupId::new();
    let mut results = ResultSet::from_items(vec![
        DuplicateItem::new(PathBuf::from("/x/1.jpg"), 1, g),
        DuplicateItem::new(PathBuf::from("/x/2.jpg"), 1, g),
        DuplicateItem::new(PathBuf::from("/x/3.jpg"), 1, g),
    ])
    .unwrap();
    let mut db = MemoryDatabase::new();

    let result = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .swap_in_group(&PathBuf::from("/x/1.jpg"));
    assert!(matches!(
        result,
        Err(RenameError::SwapGroupSize { count: 3, .. })
    ));
}

#[test]
fn test_swap_rejects_same_stem_and_same_item() {
    let g = GroupId::new();
    let a = PathBuf::from("/p/photo.jpg");
    let b = PathBuf::from("/q/photo.png");
    let mut results = ResultSet::from_items(vec![
        DuplicateItem::new(a.clone(), 1, g),
        DuplicateItem::new(b.clone(), 1, g),
    ])
    .unwrap();
    let mut db = MemoryDatabase::new();
    let options = RenameOptions::default();
    let mut coordinator = RenameCoordinator::new(&mut results, &mut db, &options);

    assert!(matches!(
        coordinator.swap(&a, &b),
        Err(RenameError::SwapSameStem(_))
    ));
    assert!(matches!(
        coordinator.swap(&a, &a),
        Err(RenameError::SwapSameItem(_))
    ));
}

#[test]
fn test_incomplete_selection() {
    let mut selection = SwapSelection::new();
    selection.set_second(PathBuf::from("/only/second.jpg"));
    assert!(!selection.is_complete());
    assert!(matches!(selection.pair(), Err(RenameError::SwapIncomplete)));
}

#[cfg(unix)]
#[test]
fn test_failed_swap_is_rolled_back() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    // First move happens inside the read-only directory and fails there
    let a = locked.join("a.jpg");
    let b = dir.path().join("b.jpg");
    fs::write(&a, b"A").unwrap();
    fs::write(&b, b"B").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    // Root ignores directory permissions; nothing to observe then
    if fs::write(locked.join("write-check"), b"").is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let g = GroupId::new();
    let mut results = ResultSet::from_items(vec![
        DuplicateItem::new(a.clone(), 1, g),
        DuplicateItem::new(b.clone(), 1, g),
    ])
    .unwrap();
    let before = results.clone();
    let mut db = MemoryDatabase::new();

    let result = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .swap(&a, &b);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(
        result,
        Err(RenameError::SwapRolledBack {
            step: SwapStep::MoveFirst,
            ..
        })
    ));
    assert!(!dir.path().join("a.jpg.dkswap").exists());
    assert_eq!(results, before);
    assert_eq!(fs::read(&a).unwrap(), b"A");
    assert_eq!(fs::read(&b).unwrap(), b"B");
}

#[cfg(unix)]
#[test]
fn test_place_second_failure_reports_stranded_parked_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let (first, second, mut results) = cross_directory_pair(dir.path());
    let right = dir.path().join("right");
    if permissions_ignored(&right) {
        return;
    }
    let parked = right.join("a.png.dkswap");

    // Lock the second directory as soon as the second file is parked
    let lock_at = parked.clone();
    let lock_dir = right.clone();
    let mut db = HookedDatabase {
        inner: MemoryDatabase::new(),
        on_rekey: move |new: &Path| {
            if new == lock_at {
                fs::set_permissions(&lock_dir, fs::Permissions::from_mode(0o555)).unwrap();
            }
        },
    };

    let result = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .swap(&first, &second);
    fs::set_permissions(&right, fs::Permissions::from_mode(0o755)).unwrap();

    match result {
        Err(RenameError::SwapRollbackFailed {
            step, stranded, ..
        }) => {
            assert_eq!(step, SwapStep::PlaceSecond);
            assert_eq!(stranded, vec![parked.clone()]);
        }
        other => panic!("expected SwapRollbackFailed, got {:?}", other),
    }
    // First was moved back; the list follows the parked second file
    assert_eq!(fs::read(&first).unwrap(), b"A");
    assert_eq!(fs::read(&parked).unwrap(), b"B");
    assert!(results.contains_path(&first));
    assert!(results.contains_path(&parked));
    assert!(!results.contains_path(&second));
}

#[cfg(unix)]
#[test]
fn test_parked_file_restored_when_other_undo_fails() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let (first, second, mut results) = cross_directory_pair(dir.path());
    let left = dir.path().join("left");
    if permissions_ignored(&left) {
        return;
    }
    let right = dir.path().join("right");
    let parked = right.join("a.png.dkswap");
    let second_target = right.join("a.png");
    let first_target = left.join("b.jpg");

    // Block the final move with a directory, and lock the first directory
    // once the first file has moved so its undo fails
    let (hook_parked, hook_first_target, hook_second_target, hook_left) = (
        parked.clone(),
        first_target.clone(),
        second_target.clone(),
        left.clone(),
    );
    let mut db = HookedDatabase {
        inner: MemoryDatabase::new(),
        on_rekey: move |new: &Path| {
            if new == hook_parked {
                fs::create_dir(&hook_second_target).unwrap();
                fs::write(hook_second_target.join("keep"), b"").unwrap();
            } else if new == hook_first_target {
                fs::set_permissions(&hook_left, fs::Permissions::from_mode(0o555)).unwrap();
            }
        },
    };

    let result = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .swap(&first, &second);
    fs::set_permissions(&left, fs::Permissions::from_mode(0o755)).unwrap();

    match result {
        Err(RenameError::SwapRollbackFailed {
            step,
            stranded,
            rollback_errors,
            ..
        }) => {
            assert_eq!(step, SwapStep::PlaceSecond);
            assert_eq!(stranded, vec![first_target.clone()]);
            assert_eq!(rollback_errors.len(), 1);
        }
        other => panic!("expected SwapRollbackFailed, got {:?}", other),
    }
    // The parked file still went home
    assert_eq!(fs::read(&second).unwrap(), b"B");
    assert!(!parked.exists());
    assert_eq!(fs::read(&first_target).unwrap(), b"A");
    assert!(results.contains_path(&second));
    assert!(results.contains_path(&first_target));
}
