//! Duplicate removal.
//!
//! # Overview
//!
//! For every [`DuplicateGroup`] the lexicographically first member is kept
//! and the rest are removed through a [`FileRemover`]:
//! - [`TrashRemover`] moves files to the system trash (default, recoverable)
//! - [`PermanentRemover`] unlinks them
//!
//! Groups may come from digests cached in an earlier run, so nothing is
//! trusted at deletion time. The kept copy and every file to be removed are
//! statted and hashed again, and must still match the group's size and
//! digest. A file that is only another name for the kept copy (hardlink or
//! symlink) is never removed. A file that fails a check, or fails to be
//! removed, is reported and the batch moves on. Successfully removed files
//! also leave the [`Inventory`], and so do files whose content changed, so
//! the next scan hashes them again.
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::actions::delete::{delete_duplicates, DeleteConfig};
//! use dupfinder::inventory::Inventory;
//!
//! # fn demo(groups: Vec<dupfinder::duplicates::DuplicateGroup>, mut inventory: Inventory) {
//! let config = DeleteConfig::trash();
//! let remover = config.remover();
//! let result = delete_duplicates(&groups, &mut inventory, remover.as_ref(), &config, None);
//! println!("{}", result.summary());
//! # }
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

use crate::duplicates::DuplicateGroup;
use crate::inventory::Inventory;
use crate::progress::{Phase, ScanObserver};
use crate::scanner::identity::same_file;
use crate::scanner::{probe_size, AccessError, Digest, HashAlgorithm, Hasher};

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0} - try running with elevated privileges")]
    PermissionDenied(PathBuf),

    /// File size no longer matches the duplicate group.
    #[error("file modified since scan: {path} (expected {expected} bytes, found {actual})")]
    Modified {
        /// Path of the changed file
        path: PathBuf,
        /// Size recorded for the group
        expected: u64,
        /// Size on disk
        actual: u64,
    },

    /// File content no longer matches the group's digest.
    #[error(
        "file modified since scan: {} (content no longer matches {})",
        .path.display(),
        .expected.short()
    )]
    ContentChanged {
        /// Path of the changed file
        path: PathBuf,
        /// Digest recorded for the group
        expected: Digest,
    },

    /// The file is another name for the kept copy, not a copy of it.
    #[error("same file as the kept copy: {path} and {kept}")]
    SameFile {
        /// Path scheduled for removal
        path: PathBuf,
        /// Path of the kept copy
        kept: PathBuf,
    },

    /// The copy that should survive is gone or changed.
    #[error("kept copy unavailable: {0}")]
    KeptCopyMissing(PathBuf),

    /// The remover could not delete the file.
    #[error("remove failed for {path}: {message}")]
    RemoveFailed {
        /// Path that could not be removed
        path: PathBuf,
        /// Reason reported by the remover
        message: String,
    },

    /// Attempted to delete all copies (at least one must be preserved).
    #[error("cannot delete all copies - at least one file must be preserved")]
    AllCopiesWouldBeDeleted,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::KeptCopyMissing(p)
            | Self::Modified { path: p, .. }
            | Self::ContentChanged { path: p, .. }
            | Self::SameFile { path: p, .. }
            | Self::RemoveFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted => None,
        }
    }
}

impl From<AccessError> for DeleteError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound(p) => Self::NotFound(p),
            AccessError::PermissionDenied(p) => Self::PermissionDenied(p),
            AccessError::Io { path, source } => Self::Io { path, source },
            AccessError::NotAFile(path) => Self::RemoveFailed {
                path,
                message: "not a regular file".to_string(),
            },
            AccessError::NonUtf8Path(path) => Self::RemoveFailed {
                path,
                message: "file name is not valid UTF-8".to_string(),
            },
            AccessError::Interrupted(path) => Self::RemoveFailed {
                path,
                message: "interrupted".to_string(),
            },
        }
    }
}

/// Side effect that removes a file from disk.
pub trait FileRemover: Send + Sync {
    /// Remove `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`DeleteError`] describing why the file is still there.
    fn remove(&self, path: &Path) -> Result<(), DeleteError>;

    /// Whether removal is irreversible.
    fn is_permanent(&self) -> bool;
}

/// Removes files with [`std::fs::remove_file`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PermanentRemover;

impl FileRemover for PermanentRemover {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        fs::remove_file(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DeleteError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => DeleteError::PermissionDenied(path.to_path_buf()),
            _ => DeleteError::RemoveFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })
    }

    fn is_permanent(&self) -> bool {
        true
    }
}

/// Moves files to the system trash.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrashRemover;

impl FileRemover for TrashRemover {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        trash::delete(path).map_err(|e| {
            log::error!("Trash operation failed for {}: {}", path.display(), e);
            DeleteError::RemoveFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })
    }

    fn is_permanent(&self) -> bool {
        false
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// Inventory key of the removed file.
    pub key: String,
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

/// Results of a batch deletion operation.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of attempted deletions.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let freed = ByteSize::b(self.bytes_freed);
        if self.all_succeeded() {
            format!("Deleted {} file(s), freed {}", self.success_count(), freed)
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                freed
            )
        }
    }

    fn fail(&mut self, path: PathBuf, error: &DeleteError) {
        log::warn!("Failed to delete {}: {}", path.display(), error);
        self.failures.push((path, error.to_string()));
    }
}

/// Configuration for deletion operations.
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    /// Use permanent deletion instead of trash.
    pub permanent: bool,
    /// Check each file still has the group's size before removing it.
    pub verify_size: bool,
    /// Hash each file again and compare with the group's digest.
    pub verify_content: bool,
    /// Continue on error (process remaining files even if some fail).
    pub continue_on_error: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            permanent: false,
            verify_size: true,
            verify_content: true,
            continue_on_error: true,
        }
    }
}

impl DeleteConfig {
    /// Create config for trash deletion.
    #[must_use]
    pub fn trash() -> Self {
        Self::default()
    }

    /// Create config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            permanent: true,
            ..Self::default()
        }
    }

    /// Enable/disable size verification.
    #[must_use]
    pub fn with_verify_size(mut self, verify: bool) -> Self {
        self.verify_size = verify;
        self
    }

    /// Enable/disable content verification.
    #[must_use]
    pub fn with_verify_content(mut self, verify: bool) -> Self {
        self.verify_content = verify;
        self
    }

    /// Enable/disable continue on error.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// The remover matching `permanent`.
    #[must_use]
    pub fn remover(&self) -> Box<dyn FileRemover> {
        if self.permanent {
            Box::new(PermanentRemover)
        } else {
            Box::new(TrashRemover)
        }
    }
}

/// What a deletion pass will do with one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Member that survives
    pub keep: String,
    /// Members to remove
    pub remove: Vec<String>,
    /// Size shared by the members
    pub size: u64,
    /// Full digest every member must still have
    pub hash: Digest,
    /// Algorithm that produced `hash`
    pub algorithm: HashAlgorithm,
}

impl DeletionPlan {
    /// Keep the first member of `group` and schedule the rest.
    ///
    /// `None` for groups with fewer than two members.
    #[must_use]
    pub fn from_group(group: &DuplicateGroup) -> Option<Self> {
        let keep = group.keep()?;
        let remove = group.duplicates().to_vec();
        if remove.is_empty() {
            return None;
        }
        Some(Self {
            keep: keep.to_string(),
            remove,
            size: group.size,
            hash: group.hash.clone(),
            algorithm: group.algorithm,
        })
    }
}

/// Keep the first member of each group and schedule the rest.
///
/// Groups with fewer than two members produce no plan.
#[must_use]
pub fn plan_deletions(groups: &[DuplicateGroup]) -> Vec<DeletionPlan> {
    groups.iter().filter_map(DeletionPlan::from_group).collect()
}

/// Validate that a selection doesn't delete all copies.
///
/// # Errors
///
/// Returns `AllCopiesWouldBeDeleted` if all copies would be deleted.
///
/// # Example
///
/// ```
/// use dupfinder::actions::delete::validate_preserves_copy;
///
/// let group = vec!["a".to_string(), "b".to_string(), "c".to_string()];
/// assert!(validate_preserves_copy(&group[1..], &group).is_ok());
/// assert!(validate_preserves_copy(&group, &group).is_err());
/// ```
pub fn validate_preserves_copy(selected: &[String], group: &[String]) -> Result<(), DeleteError> {
    let selected_set: HashSet<&String> = selected.iter().collect();
    let preserved_count = group.iter().filter(|p| !selected_set.contains(p)).count();

    if preserved_count == 0 {
        log::error!(
            "Attempted to delete all {} copies of a duplicate group",
            group.len()
        );
        Err(DeleteError::AllCopiesWouldBeDeleted)
    } else {
        Ok(())
    }
}

/// Check that `path` is still a file of `expected` bytes.
fn verify_size(path: &Path, expected: u64) -> Result<(), DeleteError> {
    let actual = probe_size(path)?;
    if actual != expected {
        return Err(DeleteError::Modified {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Check that `path` still hashes to the plan's digest.
fn verify_content(path: &Path, plan: &DeletionPlan) -> Result<(), DeleteError> {
    let actual = Hasher::new(plan.algorithm).full_hash(path)?;
    if actual != plan.hash {
        return Err(DeleteError::ContentChanged {
            path: path.to_path_buf(),
            expected: plan.hash.clone(),
        });
    }
    Ok(())
}

/// Check the copy that will survive. Its size is always checked.
fn verify_kept(path: &Path, plan: &DeletionPlan, config: &DeleteConfig) -> Result<(), DeleteError> {
    verify_size(path, plan.size)?;
    if config.verify_content {
        verify_content(path, plan)?;
    }
    Ok(())
}

/// Remove every duplicate but the first member of each group.
///
/// Removed files are dropped from `inventory`. Files that vanished before
/// their turn are dropped from it too and reported as failures, as are
/// files whose content changed since they were hashed.
pub fn delete_duplicates(
    groups: &[DuplicateGroup],
    inventory: &mut Inventory,
    remover: &dyn FileRemover,
    config: &DeleteConfig,
    observer: Option<&dyn ScanObserver>,
) -> BatchDeleteResult {
    let total: usize = groups.iter().map(|g| g.duplicates().len()).sum();
    let mut result = BatchDeleteResult::default();
    if let Some(o) = observer {
        o.on_phase_start(Phase::Delete, total);
    }

    let mut processed = 0;
    'groups: for group in groups {
        let Some(plan) = DeletionPlan::from_group(group) else {
            continue;
        };
        let keep_path = inventory.resolve(&plan.keep);
        let guard = validate_preserves_copy(&plan.remove, &group.paths)
            .and_then(|()| verify_kept(&keep_path, &plan, config));
        if let Err(e) = guard {
            log::warn!("Skipping group of {}: {}", plan.keep, e);
            if matches!(e, DeleteError::ContentChanged { .. }) {
                inventory.remove_key(&plan.keep);
            }
            for key in &plan.remove {
                let err = match e {
                    DeleteError::AllCopiesWouldBeDeleted => DeleteError::AllCopiesWouldBeDeleted,
                    _ => DeleteError::KeptCopyMissing(keep_path.clone()),
                };
                result.fail(inventory.resolve(key), &err);
            }
            processed += plan.remove.len();
            if config.continue_on_error {
                continue;
            }
            break;
        }

        for key in &plan.remove {
            processed += 1;
            let path = inventory.resolve(key);
            if let Some(o) = observer {
                o.on_progress(processed, key);
            }

            match remove_one(&path, &keep_path, &plan, remover, config) {
                Ok(()) => {
                    inventory.remove_key(key);
                    log::info!("Deleted {} ({})", path.display(), ByteSize::b(plan.size));
                    if let Some(o) = observer {
                        o.on_deleted(key, plan.size);
                    }
                    result.bytes_freed += plan.size;
                    result.successes.push(DeleteResult {
                        key: key.clone(),
                        path,
                        size: plan.size,
                        permanent: remover.is_permanent(),
                    });
                }
                Err(e) => {
                    if matches!(
                        e,
                        DeleteError::NotFound(_) | DeleteError::ContentChanged { .. }
                    ) {
                        inventory.remove_key(key);
                    }
                    result.fail(path, &e);
                    if !config.continue_on_error {
                        log::info!("Stopping batch deletion due to error (continue_on_error=false)");
                        break 'groups;
                    }
                }
            }
        }
    }

    if let Some(o) = observer {
        o.on_phase_end(Phase::Delete);
    }
    log::info!("{}", result.summary());
    result
}

fn remove_one(
    path: &Path,
    keep_path: &Path,
    plan: &DeletionPlan,
    remover: &dyn FileRemover,
    config: &DeleteConfig,
) -> Result<(), DeleteError> {
    if same_file(path, keep_path) {
        return Err(DeleteError::SameFile {
            path: path.to_path_buf(),
            kept: keep_path.to_path_buf(),
        });
    }
    if config.verify_size {
        verify_size(path, plan.size)?;
    }
    if config.verify_content {
        verify_content(path, plan)?;
    }
    remover.remove(path)
}
