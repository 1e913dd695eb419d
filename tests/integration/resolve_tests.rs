use dupekeep::actions::resolve::{
    resolve_batch, ResolveFilter, ResolveMode, ResolveOptions, ResolveRequest, SimilarityRange,
};
use dupekeep::actions::Disposal;
use dupekeep::database::{DatabaseEntry, ScanDatabase, SqliteDatabase};
use dupekeep::duplicates::{DuplicateItem, GroupId, MediaKind, ResultSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Library {
    dir: TempDir,
    results: ResultSet,
    db: SqliteDatabase,
}

impl Library {
    /// Two image groups and one video group, every file on disk and in the
    /// database.
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let photos = GroupId::new();
        let scans = GroupId::new();
        let clips = GroupId::new();
        let layout: [(&str, GroupId, MediaKind, f32); 7] = [
            ("photos/beach.jpg", photos, MediaKind::Image, 100.0),
            ("photos/beach-copy.jpg", photos, MediaKind::Image, 99.0),
            ("photos/beach-small.jpg", photos, MediaKind::Image, 80.0),
            ("scans/receipt.png", scans, MediaKind::Image, 100.0),
            ("scans/receipt (1).png", scans, MediaKind::Image, 97.0),
            ("clips/intro.mp4", clips, MediaKind::Video, 100.0),
            ("clips/intro-final.mp4", clips, MediaKind::Video, 96.0),
        ];

        let mut db = SqliteDatabase::open(&dir.path().join("db.sqlite")).unwrap();
        let mut items = Vec::new();
        for (name, group, kind, similarity) in layout {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, name.as_bytes()).unwrap();
            db.insert(&path, &DatabaseEntry::new(name.as_bytes().to_vec()))
                .unwrap();
            items.push(
                DuplicateItem::new(path, name.len() as u64, group)
                    .with_media_kind(kind)
                    .with_similarity(similarity),
            );
        }
        db.persist().unwrap();

        Self {
            dir,
            results: ResultSet::from_items(items).unwrap(),
            db,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&mut self, request: &ResolveRequest) -> dupekeep::actions::BatchOutcome {
        resolve_batch(
            &mut self.results,
            &mut self.db,
            request,
            &ResolveOptions::default(),
            None,
            None,
        )
    }
}

#[test]
fn test_permanent_batch_with_filters() {
    let mut lib = Library::new();
    lib.results.check_all_but_first();

    let request = ResolveRequest::new(ResolveMode::Permanent).with_filter(ResolveFilter {
        path_contains: Some("PHOTOS".to_string()),
        media_kind: Some(MediaKind::Image),
        similarity: SimilarityRange::new(90.0, 100.0).unwrap(),
    });
    let outcome = lib.run(&request);

    // Only the near-identical copy in the photos group goes
    assert_eq!(outcome.success_count(), 1);
    assert!(outcome.all_succeeded());
    assert_eq!(outcome.resolved[0].disposal, Some(Disposal::Deleted));
    assert!(!lib.path("photos/beach-copy.jpg").exists());
    assert!(lib.path("photos/beach-small.jpg").exists());
    assert!(lib.path("scans/receipt (1).png").exists());
    // Filtered-out items were unchecked: small copy, receipt copy, video copy
    assert_eq!(outcome.unchecked_by_filter, 3);
    assert_eq!(lib.results.summary().checked_count, 0);

    assert!(lib
        .db
        .lookup(&lib.path("photos/beach-copy.jpg"))
        .unwrap()
        .is_none());
    assert!(lib
        .db
        .lookup(&lib.path("photos/beach-small.jpg"))
        .unwrap()
        .is_some());
}

#[test]
fn test_list_only_with_exclude_blacklists_and_collapses() {
    let mut lib = Library::new();
    let copy = lib.path("scans/receipt (1).png");
    lib.results.set_checked(&copy, true);

    let outcome = lib.run(&ResolveRequest::new(ResolveMode::ListOnly).with_exclude(true));

    assert_eq!(outcome.success_count(), 1);
    assert_eq!(outcome.resolved[0].disposal, None);
    assert_eq!(outcome.bytes_freed, 0);
    // File untouched, but the scan pipeline will skip it from now on
    assert!(copy.exists());
    assert!(lib.db.is_blacklisted(&copy).unwrap());
    // The lone original left the list too
    assert_eq!(outcome.collapsed.len(), 1);
    assert_eq!(outcome.collapsed[0].path, lib.path("scans/receipt.png"));
    assert_eq!(lib.results.len(), 5);
    assert_eq!(lib.results.summary().group_count, 2);
}

#[test]
fn test_failed_item_stays_listed() {
    let mut lib = Library::new();
    let gone = lib.path("clips/intro-final.mp4");
    fs::remove_file(&gone).unwrap();
    let small = lib.path("photos/beach-small.jpg");
    lib.results.set_checked(&gone, true);
    lib.results.set_checked(&small, true);

    let outcome = lib.run(&ResolveRequest::new(ResolveMode::Permanent));

    assert_eq!(outcome.success_count(), 1);
    assert_eq!(outcome.failure_count(), 1);
    assert!(outcome.is_partial());
    assert_eq!(outcome.failures[0].path, gone);
    assert!(lib.results.contains_path(&gone));
    assert!(lib.results.get(&gone).unwrap().checked);
}

#[test]
fn test_inactive_filter_keeps_selection() {
    let mut lib = Library::new();
    lib.results.check_all_but_first();
    let outcome = lib.run(&ResolveRequest::new(ResolveMode::ListOnly));

    assert_eq!(outcome.unchecked_by_filter, 0);
    assert_eq!(outcome.success_count(), 4);
    // Every group collapsed to a single member and left the list
    assert_eq!(outcome.collapsed.len(), 3);
    assert!(lib.results.is_empty());
    // List-only never touches files
    assert!(lib.path("photos/beach-copy.jpg").exists());
}

#[cfg(unix)]
#[test]
fn test_symlink_batch_points_at_kept_member() {
    let mut lib = Library::new();
    let copy = lib.path("clips/intro-final.mp4");
    lib.results.set_checked(&copy, true);

    let outcome = lib.run(&ResolveRequest::new(ResolveMode::SymlinkReplace));

    assert_eq!(outcome.success_count(), 1);
    assert_eq!(outcome.resolved[0].disposal, Some(Disposal::Linked));
    let meta = fs::symlink_metadata(&copy).unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(fs::read_link(&copy).unwrap(), lib.path("clips/intro.mp4"));
}

#[cfg(unix)]
#[test]
fn test_symlink_without_kept_member_fails() {
    let mut lib = Library::new();
    let original = lib.path("clips/intro.mp4");
    let copy = lib.path("clips/intro-final.mp4");
    lib.results.set_checked(&original, true);
    lib.results.set_checked(&copy, true);

    let outcome = lib.run(&ResolveRequest::new(ResolveMode::SymlinkReplace));

    assert_eq!(outcome.failure_count(), 2);
    assert!(Path::new(&original).is_file());
    assert!(!fs::symlink_metadata(&copy).unwrap().file_type().is_symlink());
    assert_eq!(lib.results.len(), 7);
}

#[cfg(unix)]
#[test]
fn test_symlink_batch_spares_file_at_parked_name() {
    let mut lib = Library::new();
    let copy = lib.path("clips/intro-final.mp4");
    let bystander = lib.path("clips/intro-final.mp4.dkswap");
    fs::write(&bystander, b"USER DATA").unwrap();
    lib.results.set_checked(&copy, true);

    let outcome = lib.run(&ResolveRequest::new(ResolveMode::SymlinkReplace));

    assert_eq!(outcome.success_count(), 0);
    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(fs::read(&bystander).unwrap(), b"USER DATA");
    assert!(!fs::symlink_metadata(&copy).unwrap().file_type().is_symlink());
    assert!(lib.results.contains_path(&copy));
}

#[test]
fn test_invalid_similarity_range_rejected() {
    assert!(SimilarityRange::new(90.0, 10.0).is_err());
    assert!(SimilarityRange::new(-1.0, 10.0).is_err());
    assert!(SimilarityRange::new(0.0, 100.5).is_err());
    assert!(SimilarityRange::new(f32::NAN, 100.0).is_err());
}
