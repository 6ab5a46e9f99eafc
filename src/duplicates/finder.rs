//! Duplicate finder with staged elimination over the inventory.
//!
//! # Overview
//!
//! [`DuplicateFinder::find_duplicates`] runs four stages, each narrowing
//! the set of candidates before any more expensive I/O happens:
//!
//! 1. **Discovery**: every input path is registered in the
//!    [`Inventory`]. Stale records (size changed on disk, or digests from
//!    another algorithm) lose their digests. A second name for a file
//!    already seen (hardlink, followed symlink) is not a candidate.
//! 2. **Size elimination**: files whose size is unique cannot have a
//!    duplicate. The rest get a fast hash over their first 4 KiB.
//! 3. **Prehash elimination**: files sharing size and fast hash get a full
//!    content hash.
//! 4. **Result**: files sharing size and full hash form a
//!    [`DuplicateGroup`].
//!
//! Digests already in the inventory under the configured algorithm are
//! reused instead of recomputed. Hashing runs on a bounded rayon pool;
//! results are written back to the inventory by the calling thread once
//! the stage's workers have finished.
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::duplicates::{DuplicateFinder, FinderConfig};
//! use dupfinder::inventory::Inventory;
//! use dupfinder::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let root = Path::new("/data");
//! let (files, _errors) = Walker::new(root, WalkerConfig::default()).collect_files();
//! let mut inventory = Inventory::new(Some(root));
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
//! let (groups, summary) = finder.find_duplicates(&files, &mut inventory).unwrap();
//!
//! println!("{} groups, {} reclaimable", groups.len(), summary.reclaimable_display());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;

use super::DuplicateGroup;
use crate::inventory::{AddOutcome, Inventory, RecordUpdate};
use crate::progress::{Phase, ScanObserver};
use crate::scanner::{AccessError, Digest, FileId, HashAlgorithm, Hasher, IdentityTracker};

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Digest algorithm for both hashing stages.
    pub algorithm: HashAlgorithm,
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Consider zero-byte files as duplicates of each other.
    pub include_empty: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional observer for progress reporting.
    pub observer: Option<Arc<dyn ScanObserver>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("algorithm", &self.algorithm)
            .field("io_threads", &self.io_threads)
            .field("include_empty", &self.include_empty)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            io_threads: 4,
            include_empty: false,
            shutdown_flag: None,
            observer: None,
        }
    }
}

impl FinderConfig {
    /// Set the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the number of hashing threads (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Include zero-byte files.
    #[must_use]
    pub fn with_include_empty(mut self, include: bool) -> Self {
        self.include_empty = include;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Paths handed to the finder
    pub total_files: usize,
    /// Total size of registered candidates in bytes
    pub total_size: u64,
    /// Paths that could not be statted
    pub skipped_files: usize,
    /// Zero-byte files left out
    pub empty_files: usize,
    /// Hardlinks or followed symlinks to a file already taking part
    pub linked_files: usize,
    /// Known records whose size changed on disk
    pub stale_records: usize,
    /// Records whose digests came from another algorithm
    pub algorithm_resets: usize,
    /// Candidates with a unique size
    pub eliminated_by_size: usize,
    /// Candidates with a unique (size, fast hash)
    pub eliminated_by_prehash: usize,
    /// Fast hashes read from disk
    pub fast_hashes_computed: usize,
    /// Fast hashes reused from the inventory
    pub fast_hashes_cached: usize,
    /// Full hashes read from disk
    pub full_hashes_computed: usize,
    /// Full hashes reused from the inventory
    pub full_hashes_cached: usize,
    /// Files dropped because hashing failed
    pub hash_failures: usize,
    /// Files found missing while hashing; their records were removed
    pub vanished_files: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding the kept copy)
    pub duplicate_files: usize,
    /// Total space that can be reclaimed by removing duplicates
    pub reclaimable_space: u64,
    /// Duration of the entire scan
    pub scan_duration: Duration,
    /// Whether the scan was interrupted
    pub interrupted: bool,
}

impl ScanSummary {
    /// Number of digests read from disk in this run.
    #[must_use]
    pub fn hashes_computed(&self) -> usize {
        self.fast_hashes_computed + self.full_hashes_computed
    }

    /// Calculate the percentage of space that is wasted by duplicates.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize::b(self.reclaimable_space).to_string()
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize::b(self.total_size).to_string()
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The hashing thread pool could not be created.
    #[error("Failed to build hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Which digest a hashing stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fast,
    Full,
}

impl Stage {
    fn phase(self) -> Phase {
        match self {
            Self::Fast => Phase::Prehash,
            Self::Full => Phase::FullHash,
        }
    }
}

/// Candidates sharing a size and digest.
type Buckets = BTreeMap<(u64, Digest), Vec<String>>;

/// Duplicate finder that orchestrates the staged detection pipeline.
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new(config.algorithm);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self { config, hasher }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Find duplicate files among `files`, using and updating `inventory`.
    ///
    /// Returned groups are sorted by digest; members within a group are in
    /// lexicographic key order.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if shutdown was requested. All
    /// digests computed before that point are already recorded in the
    /// inventory, which stays consistent and may be persisted.
    pub fn find_duplicates(
        &self,
        files: &[PathBuf],
        inventory: &mut Inventory,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();
        let mut summary = ScanSummary {
            total_files: files.len(),
            ..ScanSummary::default()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()?;

        let mut candidates = self.discover(files, inventory, &mut summary);
        self.check_shutdown(&mut summary)?;

        // Stage 2: size elimination
        let size_buckets = size_buckets(inventory, &candidates);
        let sized: usize = size_buckets.iter().map(Vec::len).sum();
        summary.eliminated_by_size = candidates.len() - sized;
        log::info!(
            "Size stage: {} candidate(s) → {} share a size",
            candidates.len(),
            sized
        );
        candidates = size_buckets.into_iter().flatten().collect();
        self.hash_stage(&pool, Stage::Fast, &mut candidates, inventory, &mut summary);
        self.check_shutdown(&mut summary)?;

        // Stage 3: prehash elimination
        let fast_buckets = digest_buckets(
            inventory.groups_by_fast_hash(),
            inventory,
            &candidates,
            self.config.algorithm,
        );
        let prehashed: usize = fast_buckets.values().map(Vec::len).sum();
        summary.eliminated_by_prehash = candidates.len() - prehashed;
        log::info!(
            "Prehash stage: {} candidate(s) → {} share a prehash",
            candidates.len(),
            prehashed
        );
        candidates = fast_buckets.into_values().flatten().collect();
        self.hash_stage(&pool, Stage::Full, &mut candidates, inventory, &mut summary);
        self.check_shutdown(&mut summary)?;

        // Stage 4: confirmed groups
        let full_buckets = digest_buckets(
            inventory.groups_by_full_hash(),
            inventory,
            &candidates,
            self.config.algorithm,
        );
        let mut groups: Vec<DuplicateGroup> = full_buckets
            .into_iter()
            .map(|((size, hash), paths)| {
                DuplicateGroup::new(hash, self.config.algorithm, size, paths)
            })
            .collect();
        groups.sort_by(|a, b| a.hash.cmp(&b.hash).then(a.size.cmp(&b.size)));

        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        summary.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
        summary.scan_duration = start_time.elapsed();

        log::info!(
            "Found {} duplicate group(s), {} reclaimable, {} hash(es) computed",
            summary.duplicate_groups,
            summary.reclaimable_display(),
            summary.hashes_computed()
        );
        Ok((groups, summary))
    }

    fn check_shutdown(&self, summary: &mut ScanSummary) -> Result<(), FinderError> {
        if self.config.is_shutdown_requested() {
            summary.interrupted = true;
            log::info!("Scan interrupted; completed digests are kept");
            return Err(FinderError::Interrupted);
        }
        Ok(())
    }

    /// Register every path and return the keys taking part in this run.
    fn discover(
        &self,
        files: &[PathBuf],
        inventory: &mut Inventory,
        summary: &mut ScanSummary,
    ) -> BTreeSet<String> {
        let algorithm = self.config.algorithm;
        let mut candidates = BTreeSet::new();
        let mut identities = IdentityTracker::new();
        self.notify(|o| o.on_phase_start(Phase::Discovery, files.len()));

        for (idx, path) in files.iter().enumerate() {
            if self.config.is_shutdown_requested() {
                break;
            }
            let key = inventory.key_for(path);
            self.notify(|o| o.on_progress(idx + 1, &key));

            let outcome = inventory.add(path);
            let size = match outcome {
                AddOutcome::Added { size } | AddOutcome::Present { on_disk: size, .. } => size,
                AddOutcome::Skipped(_) => {
                    summary.skipped_files += 1;
                    continue;
                }
            };
            if outcome.is_stale() {
                log::debug!("{key}: size changed, now {size} bytes");
                summary.stale_records += 1;
                self.apply(inventory, &key, RecordUpdate::new().with_size(size));
            }

            let foreign = inventory
                .get_key(&key)
                .is_some_and(|r| r.is_hashed() && r.alg != Some(algorithm));
            if foreign {
                log::debug!("{key}: digests from another algorithm discarded");
                summary.algorithm_resets += 1;
                self.apply(inventory, &key, RecordUpdate::new().with_alg(algorithm));
            }

            if size == 0 && !self.config.include_empty {
                summary.empty_files += 1;
                continue;
            }
            if let Some(id) = FileId::of(path) {
                if let Some(first) = identities.claim(id, &key) {
                    log::info!("{key}: same file as {first}, not a copy");
                    summary.linked_files += 1;
                    continue;
                }
            }
            if candidates.insert(key) {
                summary.total_size += size;
            }
        }

        self.notify(|o| o.on_phase_end(Phase::Discovery));
        log::info!(
            "Discovery: {} candidate(s), {} skipped, {} empty, {} linked",
            candidates.len(),
            summary.skipped_files,
            summary.empty_files,
            summary.linked_files
        );
        candidates
    }

    /// Obtain the stage's digest for every candidate.
    ///
    /// Candidates that fail to hash are removed from `candidates`.
    fn hash_stage(
        &self,
        pool: &rayon::ThreadPool,
        stage: Stage,
        candidates: &mut BTreeSet<String>,
        inventory: &mut Inventory,
        summary: &mut ScanSummary,
    ) {
        let algorithm = self.config.algorithm;
        let jobs: Vec<(String, PathBuf)> = candidates
            .iter()
            .filter(|key| {
                let cached = inventory.get_key(key).is_some_and(|r| match stage {
                    Stage::Fast => r.fast_for(algorithm).is_some(),
                    Stage::Full => r.full_for(algorithm).is_some(),
                });
                if cached {
                    match stage {
                        Stage::Fast => summary.fast_hashes_cached += 1,
                        Stage::Full => summary.full_hashes_cached += 1,
                    }
                }
                !cached
            })
            .map(|key| (key.clone(), inventory.resolve(key)))
            .collect();

        if jobs.is_empty() {
            log::debug!("{}: nothing to hash", stage.phase());
            return;
        }

        let phase = stage.phase();
        log::info!("{}: hashing {} file(s)", phase, jobs.len());
        self.notify(|o| o.on_phase_start(phase, jobs.len()));

        let results: Vec<(String, Result<Digest, AccessError>)> = pool.install(|| {
            jobs.into_par_iter()
                .enumerate()
                .map(|(idx, (key, path))| {
                    if self.config.is_shutdown_requested() {
                        return (key, Err(AccessError::Interrupted(path)));
                    }
                    self.notify(|o| o.on_progress(idx + 1, &key));
                    let result = match stage {
                        Stage::Fast => self.hasher.prehash(&path),
                        Stage::Full => self.hasher.full_hash(&path),
                    };
                    (key, result)
                })
                .collect()
        });

        for (key, result) in results {
            match result {
                Ok(digest) => {
                    log::trace!("{phase} {key}: {}", digest.short());
                    let update = RecordUpdate::new().with_alg(algorithm);
                    let update = match stage {
                        Stage::Fast => {
                            summary.fast_hashes_computed += 1;
                            update.with_hash_fast(digest)
                        }
                        Stage::Full => {
                            summary.full_hashes_computed += 1;
                            update.with_hash_full(digest)
                        }
                    };
                    if !self.apply(inventory, &key, update) {
                        candidates.remove(&key);
                    }
                }
                Err(AccessError::Interrupted(_)) => {
                    candidates.remove(&key);
                }
                Err(e) => {
                    log::warn!("Dropping {key} from {phase}: {e}");
                    self.notify(|o| o.on_skipped(phase, &e));
                    summary.hash_failures += 1;
                    if e.is_not_found() {
                        summary.vanished_files += 1;
                        inventory.remove_key(&key);
                    }
                    candidates.remove(&key);
                }
            }
        }

        self.notify(|o| o.on_phase_end(phase));
    }

    /// Apply an update, logging a rejection. Returns whether it succeeded.
    fn apply(&self, inventory: &mut Inventory, key: &str, update: RecordUpdate) -> bool {
        match inventory.update_key(key, update) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Inventory update failed: {e}");
                false
            }
        }
    }

    fn notify(&self, event: impl FnOnce(&dyn ScanObserver)) {
        if let Some(ref observer) = self.config.observer {
            event(observer.as_ref());
        }
    }
}

/// Size buckets restricted to `candidates`, keeping those with 2+ members.
fn size_buckets(inventory: &Inventory, candidates: &BTreeSet<String>) -> Vec<Vec<String>> {
    inventory
        .groups_by_size()
        .filter_map(|(_, paths)| {
            let members: Vec<String> = paths
                .iter()
                .filter(|key| candidates.contains(*key))
                .cloned()
                .collect();
            (members.len() >= 2).then_some(members)
        })
        .collect()
}

/// Digest buckets split by size and restricted to `candidates` whose
/// digests come from `algorithm`, keeping those with 2+ members.
fn digest_buckets<'a>(
    buckets: impl Iterator<Item = (&'a Digest, &'a BTreeSet<String>)>,
    inventory: &Inventory,
    candidates: &BTreeSet<String>,
    algorithm: HashAlgorithm,
) -> Buckets {
    let mut out = Buckets::new();
    for (digest, paths) in buckets {
        for key in paths.iter().filter(|key| candidates.contains(*key)) {
            let Some(record) = inventory.get_key(key) else {
                continue;
            };
            if record.alg != Some(algorithm) {
                continue;
            }
            out.entry((record.size, digest.clone()))
                .or_default()
                .push(key.clone());
        }
    }
    out.retain(|_, members| members.len() >= 2);
    out
}
