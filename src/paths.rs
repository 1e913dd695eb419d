//! Path helpers shared by the ledger and the rename coordinator.
//!
//! macOS stores file names in NFD while the scan pipeline may hand us NFC
//! strings, so every comparison of item identities goes through
//! [`path_key`]. The remaining helpers build sibling paths for renames
//! without ever leaving the item's directory.
//!
//! # Example
//!
//! ```
//! use dupekeep::paths::{path_key, sibling_with_stem};
//! use std::path::Path;
//!
//! let nfd = Path::new("/photos/cafe\u{0301}.jpg");
//! let nfc = Path::new("/photos/café.jpg");
//! assert_eq!(path_key(nfd), path_key(nfc));
//!
//! let renamed = sibling_with_stem(Path::new("/photos/IMG_1.jpg"), "beach");
//! assert_eq!(renamed, Path::new("/photos/beach.jpg"));
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Normalize a [`Path`] to NFC form.
///
/// Paths that are not valid UTF-8 are returned unchanged.
#[must_use]
pub fn normalize_pathbuf(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(normalize_path_str(s)),
        None => path.to_path_buf(),
    }
}

/// Comparison key for a path.
///
/// Two paths naming the same file in different Unicode forms produce the
/// same key. Non UTF-8 paths fall back to their lossy rendering.
#[must_use]
pub fn path_key(path: &Path) -> String {
    match path.to_str() {
        Some(s) => normalize_path_str(s),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Check whether two paths are equal after NFC normalization.
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    a == b || path_key(a) == path_key(b)
}

/// File name without its final extension, or an empty string.
#[must_use]
pub fn file_stem_string(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build a path in the same directory as `path` with a new stem.
///
/// The original extension is kept. `stem` is used verbatim, so callers
/// must validate it first (see [`validate_file_stem`]).
#[must_use]
pub fn sibling_with_stem(path: &Path, stem: &str) -> PathBuf {
    let mut name = OsString::from(stem);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Append a raw suffix to the file name (`a.jpg` + `.tmp` = `a.jpg.tmp`).
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Reasons a user-supplied file stem is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemProblem {
    /// Empty or whitespace only.
    Empty,
    /// Contains a path separator or names a special directory.
    NotAFileName,
}

/// Validate a bare file stem typed by the user.
///
/// # Errors
///
/// Returns the [`StemProblem`] that makes the stem unusable.
pub fn validate_file_stem(stem: &str) -> Result<(), StemProblem> {
    if stem.trim().is_empty() {
        return Err(StemProblem::Empty);
    }
    if stem == "." || stem == ".." || stem.contains('/') || stem.contains('\\') {
        return Err(StemProblem::NotAFileName);
    }
    Ok(())
}
