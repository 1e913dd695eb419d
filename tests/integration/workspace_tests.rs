use dupekeep::actions::rename::{ConflictDecision, NewName};
use dupekeep::actions::resolve::{ResolveMode, ResolveRequest};
use dupekeep::config::{Config, SaveOnExit};
use dupekeep::database::{DatabaseEntry, ScanDatabase, SqliteDatabase};
use dupekeep::duplicates::{
    ChangeListener, DuplicateItem, GroupId, ResultSet, ResultSummary, ResultsChange,
};
use dupekeep::signal::ShutdownHandler;
use dupekeep::workspace::{SaveDecision, ShutdownOutcome, Workspace};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

struct Env {
    media: TempDir,
    store: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            media: tempdir().unwrap(),
            store: tempdir().unwrap(),
        }
    }

    fn config(&self) -> Config {
        Config {
            storage_dir: Some(self.store.path().to_path_buf()),
            ..Config::default()
        }
    }

    fn open(&self) -> Workspace<SqliteDatabase> {
        let config = self.config();
        let db = SqliteDatabase::open(&config.database_path()).unwrap();
        Workspace::open(config, db)
    }

    fn file(&self, name: &str) -> PathBuf {
        let path = self.media.path().join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    fn scan(&self, groups: &[&[&str]]) -> ResultSet {
        let mut items = Vec::new();
        for names in groups {
            let g = GroupId::new();
            for name in *names {
                items.push(DuplicateItem::new(self.file(name), 10, g));
            }
        }
        ResultSet::from_items(items).unwrap()
    }
}

#[derive(Clone, Default)]
struct Counter(Arc<Mutex<Vec<(bool, ResultSummary)>>>);

impl ChangeListener for Counter {
    fn on_change(&self, change: &ResultsChange, summary: &ResultSummary) {
        self.0
            .lock()
            .unwrap()
            .push((change.alters_membership(), summary.clone()));
    }
}

#[test]
fn test_session_lifecycle_across_restarts() {
    let env = Env::new();
    {
        let mut ws = env.open();
        ws.on_scan_complete(env.scan(&[&["a.jpg", "a2.jpg"], &["b.jpg", "b2.jpg", "b3.jpg"]]));
        assert_eq!(ws.summary().group_count, 2);
    }

    // Restart: the backup restores the list
    let mut ws = env.open();
    assert_eq!(ws.results().len(), 5);

    let group_a = ws.results().get(&env.media.path().join("a.jpg")).unwrap().group_id;
    ws.exclude_group(group_a).unwrap();

    let b3 = env.media.path().join("b3.jpg");
    ws.set_checked(&b3, true);
    let outcome = ws.resolve(&ResolveRequest::new(ResolveMode::Permanent), None, None);
    assert_eq!(outcome.success_count(), 1);
    assert!(!b3.exists());
    drop(ws);

    let ws = env.open();
    assert_eq!(ws.results().len(), 2);
    assert_eq!(ws.ledger().len(), 1);
    assert!(!ws.results().contains_path(&b3));
}

#[test]
fn test_listeners_see_each_commit() {
    let env = Env::new();
    let mut ws = env.open();
    let counter = Counter::default();
    ws.subscribe(Box::new(counter.clone()));

    ws.on_scan_complete(env.scan(&[&["x.jpg", "y.jpg"]]));
    let x = env.media.path().join("x.jpg");
    let mut never = |_: &Path| ConflictDecision::Cancel;
    ws.rename(&x, NewName::stem("x-renamed"), &mut never).unwrap();

    let seen = counter.0.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].0);
    assert_eq!(seen[0].1.item_count, 2);
    // A rename moves an item but keeps membership
    assert!(!seen[1].0);
}

#[test]
fn test_rename_updates_sqlite_and_backup() {
    let env = Env::new();
    let target;
    {
        let mut ws = env.open();
        ws.on_scan_complete(env.scan(&[&["p.jpg", "q.jpg"]]));
        let p = env.media.path().join("p.jpg");
        ws.database_mut()
            .insert(&p, &DatabaseEntry::new(vec![5]))
            .unwrap();
        ws.database_mut().persist().unwrap();

        let mut never = |_: &Path| ConflictDecision::Cancel;
        let outcome = ws.rename(&p, NewName::stem("p-final"), &mut never).unwrap();
        target = outcome.change.to;
    }

    let ws = env.open();
    assert!(ws.results().contains_path(&target));
    assert_eq!(
        ws.database().lookup(&target).unwrap(),
        Some(DatabaseEntry::new(vec![5]))
    );
}

#[test]
fn test_cancelled_batch_resolves_nothing() {
    let env = Env::new();
    let mut ws = env.open();
    ws.on_scan_complete(env.scan(&[&["c.jpg", "c2.jpg", "c3.jpg"]]));
    ws.check_all_but_first();

    let handler = ShutdownHandler::new();
    handler.request_shutdown();
    let outcome = ws.resolve(
        &ResolveRequest::new(ResolveMode::Permanent),
        None,
        Some(handler.flag()),
    );

    assert!(outcome.cancelled);
    assert_eq!(outcome.success_count(), 0);
    assert_eq!(ws.results().len(), 3);
    assert!(env.media.path().join("c3.jpg").exists());
}

#[test]
fn test_shutdown_without_auto_backup() {
    let env = Env::new();
    let config = Config {
        backup_after_change: false,
        save_on_exit: SaveOnExit::Ask,
        ..env.config()
    };
    let db = SqliteDatabase::open(&config.database_path()).unwrap();
    let mut ws = Workspace::open(config.clone(), db);
    ws.on_scan_complete(env.scan(&[&["s.jpg", "t.jpg"]]));
    assert!(!config.backup_path().exists());

    assert_eq!(
        ws.shutdown(|| SaveDecision::Yes).unwrap(),
        ShutdownOutcome::Saved
    );
    drop(ws);

    let reopened = env.open();
    assert_eq!(reopened.results().len(), 2);
}

#[test]
fn test_import_replaces_list_after_confirmation() {
    let env = Env::new();
    let export = env.store.path().join("export.json");
    let mut ws = env.open();
    ws.on_scan_complete(env.scan(&[&["i.jpg", "j.jpg"]]));
    ws.export_json(&export, false).unwrap();
    ws.clear();
    assert!(ws.results().is_empty());

    // Empty list: no confirmation needed
    let imported = ws
        .import_json(&export, |_| panic!("nothing to discard"))
        .unwrap();
    assert!(imported);
    assert_eq!(ws.results().len(), 2);
}
