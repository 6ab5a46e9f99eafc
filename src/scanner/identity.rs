//! Physical file identity.
//!
//! Two names can lead to one file: hardlinks, or a followed symlink next
//! to its target. Such names share content but are not copies, and
//! removing one of them as a "duplicate" can destroy the only data.
//!
//! # Platform Support
//!
//! - **Unix**: `(device, inode)` pairs from file metadata
//! - **Other**: no identity; [`same_file`] falls back to comparing
//!   canonical paths, which still catches symlinks
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::scanner::identity::{FileId, IdentityTracker};
//! use std::path::Path;
//!
//! let mut tracker = IdentityTracker::new();
//! for (key, path) in [("a.txt", Path::new("/data/a.txt")), ("b.txt", Path::new("/data/b.txt"))] {
//!     if let Some(id) = FileId::of(path) {
//!         if let Some(first) = tracker.claim(id, key) {
//!             println!("{key} is the same file as {first}");
//!         }
//!     }
//! }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::path::Path;

/// Identity of the file a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Identity from metadata, if the platform exposes one.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Identity from metadata, if the platform exposes one.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Identity of the file `path` resolves to, following symlinks.
    ///
    /// `None` when the path cannot be statted or the platform has no
    /// identity.
    #[must_use]
    pub fn of(path: &Path) -> Option<Self> {
        fs::metadata(path)
            .ok()
            .and_then(|m| Self::from_metadata(&m))
    }
}

/// Whether file identities are available on this platform.
#[must_use]
pub const fn is_supported() -> bool {
    cfg!(unix)
}

/// Whether `a` and `b` lead to the same file on disk.
///
/// Missing files are never the same file.
#[must_use]
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (FileId::of(a), FileId::of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        },
    }
}

/// Remembers which key first claimed each file identity.
///
/// Not thread-safe; the finder uses one per discovery pass.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    seen: HashMap<FileId, String>,
}

impl IdentityTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for `key`.
    ///
    /// Returns the key that claimed the identity earlier, or `None` if
    /// `key` is its first claimant. Claiming again under the same key is
    /// not a conflict.
    pub fn claim(&mut self, id: FileId, key: &str) -> Option<&str> {
        match self.seen.entry(id) {
            Entry::Occupied(entry) => {
                let first: &str = entry.into_mut().as_str();
                (first != key).then_some(first)
            }
            Entry::Vacant(entry) => {
                entry.insert(key.to_string());
                None
            }
        }
    }

    /// Number of distinct identities seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been claimed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
