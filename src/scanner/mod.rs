//! Scanner module for file discovery, probing and hashing.
//!
//! This module provides functionality for:
//! - Directory walking with extension exclusion
//! - Stat probes that report access failures as values
//! - Content hashing with a selectable algorithm
//! - Path key normalization relative to a base directory
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Prehash and full-content digests
//! - [`identity`]: Telling links to one file apart from real copies
//! - [`path_utils`]: Inventory key normalization
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     exclude_extensions: vec!["tmp".to_string()],
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod identity;
pub mod path_utils;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

pub use hasher::{Digest, HashAlgorithm, Hasher, UnknownAlgorithm, PREHASH_SIZE};
pub use identity::{FileId, IdentityTracker};
pub use walker::Walker;

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// File extensions to skip, compared case-insensitively and without
    /// the leading dot.
    pub exclude_extensions: Vec<String>,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(follow_symlinks: bool, exclude_extensions: Vec<String>) -> Self {
        Self {
            follow_symlinks,
            exclude_extensions,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Per-file access failure.
///
/// Raised while statting, hashing or deleting a single file. These never
/// abort a batch: the caller logs them and drops the file from the stage.
#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    /// The file does not exist (possibly removed concurrently).
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when accessing the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path exists but is not a regular file.
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The file name cannot be stored as a UTF-8 inventory key.
    #[error("File name is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// Work on the file was abandoned because shutdown was requested.
    #[error("Interrupted: {0}")]
    Interrupted(PathBuf),

    /// Any other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl AccessError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// The path this error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::NotAFile(p)
            | Self::NonUtf8Path(p)
            | Self::Interrupted(p)
            | Self::Io { path: p, .. } => p,
        }
    }

    /// Whether the file is gone for good.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Stat a file and return its size.
///
/// # Errors
///
/// Returns [`AccessError`] if the path is missing, unreadable, or not a
/// regular file.
pub fn probe_size(path: &Path) -> Result<u64, AccessError> {
    let metadata = std::fs::metadata(path).map_err(|e| AccessError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(AccessError::NotAFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}
