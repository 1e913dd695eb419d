use dupekeep::duplicates::{DuplicateItem, GroupId, MediaKind, Preview, ResultSet};
use dupekeep::session::{self, BackupFile, SerializeError, BACKUP_VERSION};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

fn sample() -> ResultSet {
    let g1 = GroupId::new();
    let g2 = GroupId::new();
    ResultSet::from_items(vec![
        DuplicateItem::new(PathBuf::from("/media/a.mp4"), 3_000_000, g1)
            .with_media_kind(MediaKind::Video)
            .with_duration(Duration::from_millis(61_500))
            .with_frame(1920, 1080)
            .with_similarity(100.0)
            .with_preview(Preview {
                width: 2,
                height: 1,
                data: vec![0xff, 0xd8, 0xff],
            }),
        DuplicateItem::new(PathBuf::from("/photos/x.jpg"), 2048, g2).with_checked(true),
        DuplicateItem::new(PathBuf::from("/media/b.mp4"), 2_900_000, g1)
            .with_media_kind(MediaKind::Video)
            .with_similarity(98.5),
        DuplicateItem::new(PathBuf::from("/photos/y.jpg"), 2048, g2),
    ])
    .unwrap()
}

#[test]
fn test_backup_preserves_everything() {
    let dir = tempdir().unwrap();
    let backup = BackupFile::new(dir.path().join("backup.scanresults"));
    let results = sample();

    backup.save(&results).unwrap();
    let restored = backup.load().unwrap().expect("backup exists");

    // Order, check marks and previews all survive
    assert_eq!(restored, results);
}

#[test]
fn test_missing_or_empty_backup_means_none() {
    let dir = tempdir().unwrap();
    let backup = BackupFile::new(dir.path().join("backup.scanresults"));
    assert!(backup.load().unwrap().is_none());

    fs::write(backup.path(), b"").unwrap();
    assert!(backup.load().unwrap().is_none());
}

#[test]
fn test_tampered_backup_is_rejected() {
    let dir = tempdir().unwrap();
    let backup = BackupFile::new(dir.path().join("backup.scanresults"));
    backup.save(&sample()).unwrap();

    // Rename one stored path behind the checksum's back
    let mut bytes = fs::read(backup.path()).unwrap();
    let needle = b"/photos/y.jpg";
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    bytes[at + 8] = b'z';
    fs::write(backup.path(), &bytes).unwrap();

    assert!(matches!(
        backup.load(),
        Err(SerializeError::ChecksumMismatch(_))
    ));
}

#[test]
fn test_backup_version_is_checked() {
    let bytes = session::backup::encode(sample().items()).unwrap();
    let decoded = session::backup::decode(&bytes, std::path::Path::new("mem")).unwrap();
    assert_eq!(decoded.len(), 4);
    assert_eq!(BACKUP_VERSION, 1);
}

#[test]
fn test_export_is_grouped_and_drops_ui_state() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("export.json");
    let results = sample();
    session::write_json(&results, &out, true).unwrap();

    let text = fs::read_to_string(&out).unwrap();
    assert!(!text.contains("previews"));
    assert!(!text.contains("checked"));
    assert!(text.contains("\"secs\": 61"));
    assert!(text.contains("\"nanos\": 500000000"));

    let imported = session::read_json(&out).unwrap();
    assert_eq!(imported.len(), 4);
    // Members of a group are adjacent after export
    let groups: Vec<GroupId> = imported.iter().map(|i| i.group_id).collect();
    assert_eq!(groups[0], groups[1]);
    assert_eq!(groups[2], groups[3]);
    assert!(imported.iter().all(|i| !i.checked && i.previews.is_empty()));

    let video = imported.get(&PathBuf::from("/media/a.mp4")).unwrap();
    assert_eq!(video.duration, Duration::from_millis(61_500));
    assert_eq!((video.frame_width, video.frame_height), (1920, 1080));
    assert_eq!(video.media_kind, MediaKind::Video);
}

#[test]
fn test_import_rejects_duplicate_paths() {
    let g = GroupId::new();
    let json = format!(
        r#"[
  {{"path":"/a.jpg","size":1,"duration":{{"secs":0,"nanos":0}},"frame_width":0,"frame_height":0,"group_id":"{g}","similarity":100.0,"created":"2024-01-01T00:00:00Z","media_kind":"image"}},
  {{"path":"/a.jpg","size":1,"duration":{{"secs":0,"nanos":0}},"frame_width":0,"frame_height":0,"group_id":"{g}","similarity":100.0,"created":"2024-01-01T00:00:00Z","media_kind":"image"}}
]"#
    );
    assert!(matches!(
        session::import_json(&json),
        Err(SerializeError::Invalid(_))
    ));
}

#[test]
fn test_import_malformed_json() {
    assert!(matches!(
        session::import_json("[{\"path\": 3}]"),
        Err(SerializeError::Json(_))
    ));
}
