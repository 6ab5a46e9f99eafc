//! Inventory record and update definitions.

use crate::scanner::{AccessError, Digest, HashAlgorithm};

/// Known attributes of one file, keyed by its path in the inventory.
///
/// A full hash is only ever recorded next to a fast hash computed with the
/// same algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    /// File size in bytes
    pub size: u64,
    /// Digest of the first 4096 bytes
    pub hash_fast: Option<Digest>,
    /// Digest of the whole content
    pub hash_full: Option<Digest>,
    /// Algorithm behind both digests
    pub alg: Option<HashAlgorithm>,
}

impl InventoryRecord {
    /// A freshly discovered file: size known, nothing hashed.
    #[must_use]
    pub fn new(size: u64) -> Self {
        Self {
            size,
            hash_fast: None,
            hash_full: None,
            alg: None,
        }
    }

    /// Fast hash, if it was computed with `alg`.
    #[must_use]
    pub fn fast_for(&self, alg: HashAlgorithm) -> Option<&Digest> {
        self.hash_fast.as_ref().filter(|_| self.alg == Some(alg))
    }

    /// Full hash, if it was computed with `alg`.
    #[must_use]
    pub fn full_for(&self, alg: HashAlgorithm) -> Option<&Digest> {
        self.hash_full.as_ref().filter(|_| self.alg == Some(alg))
    }

    /// Whether any digest is recorded.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        self.hash_fast.is_some() || self.hash_full.is_some()
    }
}

/// Why a [`RecordUpdate`] could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateRejection {
    /// The result would hold a full hash without a fast hash.
    MissingFastHash,
    /// The result would hold digests with no algorithm.
    MissingAlgorithm,
}

/// A partial change to an [`InventoryRecord`].
///
/// Fields left as `None` are not touched, with these exceptions that keep
/// stale digests from being trusted:
/// - a new `size`, or an `alg` different from the recorded one, clears
///   both digests unless this update supplies them
/// - a new `hash_fast` clears `hash_full` unless this update supplies one
///
/// # Example
///
/// ```
/// use dupfinder::inventory::RecordUpdate;
/// use dupfinder::scanner::{Digest, HashAlgorithm};
///
/// let update = RecordUpdate::new()
///     .with_hash_fast(Digest::new("ab12"))
///     .with_alg(HashAlgorithm::Blake3);
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    /// New size
    pub size: Option<u64>,
    /// New fast hash
    pub hash_fast: Option<Digest>,
    /// New full hash
    pub hash_full: Option<Digest>,
    /// Algorithm for the digests
    pub alg: Option<HashAlgorithm>,
}

impl RecordUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the fast hash.
    #[must_use]
    pub fn with_hash_fast(mut self, digest: Digest) -> Self {
        self.hash_fast = Some(digest);
        self
    }

    /// Set the full hash.
    #[must_use]
    pub fn with_hash_full(mut self, digest: Digest) -> Self {
        self.hash_full = Some(digest);
        self
    }

    /// Set the algorithm.
    #[must_use]
    pub fn with_alg(mut self, alg: HashAlgorithm) -> Self {
        self.alg = Some(alg);
        self
    }

    /// Whether the update carries no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.hash_fast.is_none()
            && self.hash_full.is_none()
            && self.alg.is_none()
    }

    /// Compute the record that results from applying this update.
    pub(crate) fn apply(&self, current: &InventoryRecord) -> Result<InventoryRecord, UpdateRejection> {
        let mut next = current.clone();
        let mut invalidate = false;

        if let Some(size) = self.size {
            invalidate |= size != current.size;
            next.size = size;
        }
        if let Some(alg) = self.alg {
            invalidate |= current.alg != Some(alg);
            next.alg = Some(alg);
        }
        if invalidate {
            next.hash_fast = None;
            next.hash_full = None;
        }

        if let Some(ref fast) = self.hash_fast {
            if next.hash_fast.as_ref() != Some(fast) {
                next.hash_full = None;
            }
            next.hash_fast = Some(fast.clone());
        }
        if let Some(ref full) = self.hash_full {
            next.hash_full = Some(full.clone());
        }

        if next.hash_full.is_some() && next.hash_fast.is_none() {
            return Err(UpdateRejection::MissingFastHash);
        }
        if next.is_hashed() && next.alg.is_none() {
            return Err(UpdateRejection::MissingAlgorithm);
        }
        Ok(next)
    }
}

/// Result of registering a path with [`Inventory::add`](super::Inventory::add).
#[derive(Debug)]
pub enum AddOutcome {
    /// A new record was created.
    Added {
        /// Size read from disk
        size: u64,
    },
    /// The path was already known; the record was left untouched.
    Present {
        /// Size stored in the record
        recorded: u64,
        /// Size currently on disk
        on_disk: u64,
    },
    /// The file could not be statted and was skipped.
    Skipped(AccessError),
}

impl AddOutcome {
    /// Whether a known record no longer matches the file on disk.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Present { recorded, on_disk } if recorded != on_disk)
    }
}
