//! Path key normalization for the inventory.
//!
//! Inventory records are keyed by a string derived from the file path. The
//! same file must always map to the same key, regardless of how the caller
//! spelled the path, or records written in one run will not match the next.
//!
//! Keys are built in two steps:
//!
//! 1. Lexical normalization: `.` components are dropped and `..` components
//!    are folded into their parent where possible. The filesystem is not
//!    consulted, so a `..` after a symlinked directory folds to a different
//!    file than the OS would open. Walker output never contains `..`; the
//!    folding only matters for paths spelled by a caller.
//! 2. If the path lies under the base directory, the base prefix is
//!    stripped and the key is relative. Otherwise the normalized path is
//!    used as is.
//!
//! Keys are UTF-8. A path whose key part is not valid UTF-8 has no key:
//! check [`is_representable`] before recording it.
//!
//! Keys always use `/` as separator so snapshots are portable.
//!
//! # Example
//!
//! ```
//! use dupfinder::scanner::path_utils::{path_key, resolve_key};
//! use std::path::{Path, PathBuf};
//!
//! let base = Path::new("/data");
//! assert_eq!(path_key(Path::new("/data/./photos/a.jpg"), Some(base)), "photos/a.jpg");
//! assert_eq!(path_key(Path::new("/other/b.jpg"), Some(base)), "/other/b.jpg");
//! assert_eq!(resolve_key("photos/a.jpg", Some(base)), PathBuf::from("/data/photos/a.jpg"));
//! ```

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path without touching the filesystem.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Compute the inventory key for `path`.
///
/// Non-UTF-8 components are replaced lossily; see [`is_representable`].
#[must_use]
pub fn path_key(path: &Path, base: Option<&Path>) -> String {
    to_key_string(&keyed_path(path, base))
}

/// Whether `path` has a key that maps back to it exactly.
///
/// Only the part below `base` counts, so a non-UTF-8 base directory does
/// not matter.
#[must_use]
pub fn is_representable(path: &Path, base: Option<&Path>) -> bool {
    keyed_path(path, base).to_str().is_some()
}

fn keyed_path(path: &Path, base: Option<&Path>) -> PathBuf {
    let normalized = normalize_lexically(path);
    match base {
        Some(base) => {
            let base = normalize_lexically(base);
            match normalized.strip_prefix(&base) {
                Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
                _ => normalized,
            }
        }
        None => normalized,
    }
}

/// Map an inventory key back to a filesystem path.
#[must_use]
pub fn resolve_key(key: &str, base: Option<&Path>) -> PathBuf {
    let path = Path::new(key);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

fn to_key_string(path: &Path) -> String {
    let text = path.to_string_lossy();
    if cfg!(windows) {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    }
}
