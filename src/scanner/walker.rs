//! Directory walker built on walkdir.
//!
//! # Overview
//!
//! [`Walker`] produces the list of regular files handed to the duplicate
//! finder. Directories are visited in sorted order so repeated runs see the
//! same sequence, and files whose extension is in the exclusion list are
//! skipped before they ever reach the inventory.
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Pictures"), WalkerConfig::default());
//! let (files, errors) = walker.collect_files();
//! println!("{} files, {} errors", files.len(), errors.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::{ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Lowercased extensions without the leading dot
    excluded: Vec<String>,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        let excluded = config
            .exclude_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            root: path.to_path_buf(),
            config,
            excluded,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set, iteration stops at the next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Check the root before walking.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`].
    pub fn validate_root(&self) -> Result<(), ScanError> {
        let metadata = std::fs::metadata(&self.root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound(self.root.clone()),
            std::io::ErrorKind::PermissionDenied => {
                ScanError::PermissionDenied(self.root.clone())
            }
            _ => ScanError::Io {
                path: self.root.clone(),
                source: e,
            },
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    /// Whether the file's extension is excluded.
    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.excluded.iter().any(|x| *x == ext))
    }

    /// Walk the directory tree, yielding regular file paths.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .take_while(move |_| !self.is_shutdown_requested())
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    if self.is_excluded(entry.path()) {
                        log::trace!("Excluded by extension: {}", entry.path().display());
                        return None;
                    }
                    Some(Ok(entry.into_path()))
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let err = match e.into_io_error() {
                        Some(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                            ScanError::PermissionDenied(path)
                        }
                        Some(io) => ScanError::Io { path, source: io },
                        None => ScanError::Io {
                            path,
                            source: std::io::Error::other("filesystem loop detected"),
                        },
                    };
                    log::warn!("{}", err);
                    Some(Err(err))
                }
            })
    }

    /// Walk and split the results into files and errors.
    #[must_use]
    pub fn collect_files(&self) -> (Vec<PathBuf>, Vec<ScanError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for result in self.walk() {
            match result {
                Ok(path) => files.push(path),
                Err(e) => errors.push(e),
            }
        }
        log::info!(
            "Found {} file(s) under {}",
            files.len(),
            self.root.display()
        );
        (files, errors)
    }
}
