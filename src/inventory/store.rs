//! The inventory store and its operations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::Indexes;
use super::record::{AddOutcome, InventoryRecord, RecordUpdate, UpdateRejection};
use super::{snapshot, InventoryError};
use crate::progress::{Phase, ScanObserver};
use crate::scanner::path_utils::{is_representable, path_key, resolve_key};
use crate::scanner::{probe_size, AccessError, Digest};

/// Record store with size and digest indexes.
///
/// Paths passed to the path-based methods are normalized into keys with
/// [`Inventory::key_for`]. The `*_key` variants take a key as returned by
/// the group views and skip normalization.
#[derive(Clone, Default)]
pub struct Inventory {
    base: Option<PathBuf>,
    records: BTreeMap<String, InventoryRecord>,
    indexes: Indexes,
    observer: Option<Arc<dyn ScanObserver>>,
}

impl Inventory {
    /// Create an empty inventory.
    ///
    /// Paths under `base` are stored relative to it.
    #[must_use]
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
            ..Self::default()
        }
    }

    /// Load a snapshot from `source`.
    ///
    /// A missing file yields an empty inventory.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Format`] for an unsupported extension or
    /// corrupt content, and [`InventoryError::Io`] if the file cannot be
    /// read.
    pub fn load(source: &Path, base: Option<&Path>) -> Result<Self, InventoryError> {
        let records = snapshot::read(source)?;
        let indexes = Indexes::rebuild(&records);
        Ok(Self {
            base: base.map(Path::to_path_buf),
            records,
            indexes,
            observer: None,
        })
    }

    /// Write the inventory to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Format`] for an unsupported extension and
    /// [`InventoryError::Io`] if writing fails.
    pub fn persist(&self, destination: &Path) -> Result<(), InventoryError> {
        snapshot::write(destination, &self.records)?;
        log::info!(
            "Saved {} inventory record(s) to {}",
            self.records.len(),
            destination.display()
        );
        Ok(())
    }

    /// Attach an observer for skipped files.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Base directory for relative keys.
    #[must_use]
    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Key under which `path` is stored.
    #[must_use]
    pub fn key_for(&self, path: &Path) -> String {
        path_key(path, self.base.as_deref())
    }

    /// Filesystem path for `key`.
    #[must_use]
    pub fn resolve(&self, key: &str) -> PathBuf {
        resolve_key(key, self.base.as_deref())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the inventory holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `path` has a record.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(&self.key_for(path))
    }

    /// Record for `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&InventoryRecord> {
        self.records.get(&self.key_for(path))
    }

    /// Record stored under `key`.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&InventoryRecord> {
        self.records.get(key)
    }

    /// All records in key order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &InventoryRecord)> {
        self.records.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Register `path`, statting it for its size.
    ///
    /// A known path is left untouched; the outcome reports both sizes so
    /// the caller can decide whether the record is stale. Paths without an
    /// exact UTF-8 key are skipped.
    pub fn add(&mut self, path: &Path) -> AddOutcome {
        let probed = if is_representable(path, self.base.as_deref()) {
            probe_size(path)
        } else {
            Err(AccessError::NonUtf8Path(path.to_path_buf()))
        };
        let size = match probed {
            Ok(size) => size,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                if let Some(ref observer) = self.observer {
                    observer.on_skipped(Phase::Discovery, &e);
                }
                return AddOutcome::Skipped(e);
            }
        };

        let key = self.key_for(path);
        if let Some(record) = self.records.get(&key) {
            return AddOutcome::Present {
                recorded: record.size,
                on_disk: size,
            };
        }

        let record = InventoryRecord::new(size);
        self.indexes.relocate(&key, None, Some(&record));
        self.records.insert(key, record);
        AddOutcome::Added { size }
    }

    /// Apply `update` to the record for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnknownPath`] if there is no record, and
    /// [`InventoryError::MissingFastHash`] or
    /// [`InventoryError::MissingAlgorithm`] if the result would break the
    /// digest invariants. The record is unchanged on error.
    pub fn update(&mut self, path: &Path, update: RecordUpdate) -> Result<(), InventoryError> {
        let key = self.key_for(path);
        self.update_key(&key, update)
    }

    /// Apply `update` to the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Same as [`Inventory::update`].
    pub fn update_key(&mut self, key: &str, update: RecordUpdate) -> Result<(), InventoryError> {
        let current = self
            .records
            .get(key)
            .ok_or_else(|| InventoryError::UnknownPath(key.to_string()))?;

        let next = update.apply(current).map_err(|rejection| match rejection {
            UpdateRejection::MissingFastHash => InventoryError::MissingFastHash(key.to_string()),
            UpdateRejection::MissingAlgorithm => InventoryError::MissingAlgorithm(key.to_string()),
        })?;
        if next == *current {
            return Ok(());
        }

        log::trace!("Updating {key}: {update:?}");
        self.indexes.relocate(key, Some(current), Some(&next));
        self.records.insert(key.to_string(), next);
        Ok(())
    }

    /// Drop the record for `path`.
    pub fn remove(&mut self, path: &Path) -> Option<InventoryRecord> {
        let key = self.key_for(path);
        self.remove_key(&key)
    }

    /// Drop the record stored under `key`.
    pub fn remove_key(&mut self, key: &str) -> Option<InventoryRecord> {
        let Some(record) = self.records.remove(key) else {
            log::warn!("Cannot remove {key}: not in inventory");
            return None;
        };
        self.indexes.relocate(key, Some(&record), None);
        Some(record)
    }

    /// Drop every record whose file no longer exists.
    ///
    /// Returns the number of records removed.
    pub fn prune_missing(&mut self) -> usize {
        let missing: Vec<String> = self
            .records
            .keys()
            .filter(|key| !self.resolve(key).is_file())
            .cloned()
            .collect();
        for key in &missing {
            log::debug!("Pruning vanished file {key}");
            self.remove_key(key);
        }
        missing.len()
    }

    /// Paths grouped by size.
    pub fn groups_by_size(&self) -> impl Iterator<Item = (u64, &BTreeSet<String>)> {
        self.indexes.by_size.iter().map(|(size, paths)| (*size, paths))
    }

    /// Paths grouped by fast digest.
    pub fn groups_by_fast_hash(&self) -> impl Iterator<Item = (&Digest, &BTreeSet<String>)> {
        self.indexes.by_fast.iter()
    }

    /// Paths grouped by full digest.
    pub fn groups_by_full_hash(&self) -> impl Iterator<Item = (&Digest, &BTreeSet<String>)> {
        self.indexes.by_full.iter()
    }

    /// Paths with the given size.
    #[must_use]
    pub fn paths_with_size(&self, size: u64) -> Option<&BTreeSet<String>> {
        self.indexes.by_size.get(&size)
    }

    /// Whether the indexes agree with a rebuild from the primary store.
    #[must_use]
    pub fn indexes_consistent(&self) -> bool {
        self.indexes == Indexes::rebuild(&self.records)
    }
}

impl fmt::Debug for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("base", &self.base)
            .field("records", &self.records.len())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
