use dupekeep::actions::rename::{
    ConflictDecision, NewName, RenameCoordinator, RenameError, RenameOptions,
};
use dupekeep::database::{DatabaseEntry, MemoryDatabase, ScanDatabase, SqliteDatabase};
use dupekeep::duplicates::{DuplicateItem, GroupId, ResultSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn setup(names: &[&str]) -> (TempDir, Vec<PathBuf>, ResultSet) {
    let dir = tempdir().unwrap();
    let g = GroupId::new();
    let mut paths = Vec::new();
    let mut items = Vec::new();
    for name in names {
        let path = dir.path().join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        items.push(DuplicateItem::new(path.clone(), name.len() as u64, g));
        paths.push(path);
    }
    (dir, paths, ResultSet::from_items(items).unwrap())
}

fn never(_: &Path) -> ConflictDecision {
    panic!("no conflict expected")
}

#[test]
fn test_rename_keeps_extension_and_updates_everything() {
    let (dir, paths, mut results) = setup(&["holiday.jpg", "copy.jpg"]);
    let mut db = MemoryDatabase::new();
    db.insert(paths[1].clone(), DatabaseEntry::new(vec![1, 2, 3]));

    let outcome = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .rename(&paths[1], NewName::stem("holiday-2"), &mut never)
        .unwrap();

    let target = dir.path().join("holiday-2.jpg");
    assert_eq!(outcome.change.to, target);
    assert!(outcome.sync_warnings.is_empty());
    assert!(target.exists());
    assert!(!paths[1].exists());
    assert!(results.contains_path(&target));
    assert!(!results.contains_path(&paths[1]));
    assert_eq!(
        db.lookup(&target).unwrap(),
        Some(DatabaseEntry::new(vec![1, 2, 3]))
    );
    assert_eq!(db.persist_count(), 1);
}

#[test]
fn test_rename_retry_after_conflict() {
    let (dir, paths, mut results) = setup(&["a.jpg", "b.jpg"]);
    fs::write(dir.path().join("taken.jpg"), b"other").unwrap();
    let mut db = MemoryDatabase::new();

    let mut asked = Vec::new();
    let mut resolver = |target: &Path| {
        asked.push(target.to_path_buf());
        ConflictDecision::Retry("free".to_string())
    };
    let outcome = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .rename(&paths[0], NewName::stem("taken"), &mut resolver)
        .unwrap();

    assert_eq!(asked, vec![dir.path().join("taken.jpg")]);
    assert_eq!(outcome.change.to, dir.path().join("free.jpg"));
    assert_eq!(fs::read(dir.path().join("taken.jpg")).unwrap(), b"other");
}

#[test]
fn test_rename_overwrite_drops_displaced_item() {
    let (dir, paths, mut results) = setup(&["a.jpg", "b.jpg", "c.jpg"]);
    let mut db = MemoryDatabase::new();

    let mut overwrite = |_: &Path| ConflictDecision::Overwrite;
    let outcome = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .rename(&paths[0], NewName::stem("b"), &mut overwrite)
        .unwrap();

    let displaced = outcome.displaced.expect("b.jpg was in the list");
    assert_eq!(displaced.path, paths[1]);
    assert_eq!(results.len(), 2);
    assert_eq!(fs::read(dir.path().join("b.jpg")).unwrap(), b"a.jpg");
}

#[test]
fn test_rename_cancel_changes_nothing() {
    let (_dir, paths, mut results) = setup(&["a.jpg", "b.jpg"]);
    let mut db = MemoryDatabase::new();
    let before = results.clone();

    let mut cancel = |_: &Path| ConflictDecision::Cancel;
    let result = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .rename(&paths[0], NewName::stem("b"), &mut cancel);

    assert!(matches!(result, Err(RenameError::TargetExists(_))));
    assert_eq!(results, before);
    assert_eq!(db.persist_count(), 0);
}

#[test]
fn test_rename_validation_errors() {
    let (_dir, paths, mut results) = setup(&["a.jpg", "b.jpg"]);
    let mut db = MemoryDatabase::new();
    let options = RenameOptions::default();
    let mut coordinator = RenameCoordinator::new(&mut results, &mut db, &options);

    assert!(matches!(
        coordinator.rename(&paths[0], NewName::stem(""), &mut never),
        Err(RenameError::EmptyName)
    ));
    assert!(matches!(
        coordinator.rename(&paths[0], NewName::stem("sub/dir"), &mut never),
        Err(RenameError::InvalidName(_))
    ));
    assert!(matches!(
        coordinator.rename(&paths[0], NewName::stem("a"), &mut never),
        Err(RenameError::NameUnchanged(_))
    ));
    assert!(matches!(
        coordinator.rename(Path::new("/not/listed.jpg"), NewName::stem("x"), &mut never),
        Err(RenameError::UnknownItem(_))
    ));
}

#[test]
fn test_rename_database_failure_is_a_warning() {
    let (dir, paths, mut results) = setup(&["a.jpg", "b.jpg"]);
    let mut db = MemoryDatabase::new();
    db.insert(paths[0].clone(), DatabaseEntry::new(vec![9]));
    db.set_fail_rekey(true);

    let outcome = RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
        .rename(&paths[0], NewName::stem("renamed"), &mut never)
        .unwrap();

    assert_eq!(outcome.sync_warnings.len(), 1);
    // Disk and list agree even though the database does not
    assert!(dir.path().join("renamed.jpg").exists());
    assert!(results.contains_path(&dir.path().join("renamed.jpg")));
}

#[test]
fn test_rename_with_sqlite_database() {
    let (dir, paths, mut results) = setup(&["a.jpg", "b.jpg"]);
    let db_path = dir.path().join("db.sqlite");
    let target = dir.path().join("z.jpg");
    {
        let mut db = SqliteDatabase::open(&db_path).unwrap();
        db.insert(&paths[0], &DatabaseEntry::new(vec![4, 2])).unwrap();
        db.persist().unwrap();

        RenameCoordinator::new(&mut results, &mut db, &RenameOptions::default())
            .rename(&paths[0], NewName::file_name("z.jpg"), &mut never)
            .unwrap();
    }

    let db = SqliteDatabase::open(&db_path).unwrap();
    assert_eq!(
        db.lookup(&target).unwrap(),
        Some(DatabaseEntry::new(vec![4, 2]))
    );
    assert!(db.lookup(&paths[0]).unwrap().is_none());
}
