//! Streaming file hasher with a selectable digest algorithm.
//!
//! # Overview
//!
//! [`Hasher`] computes two kinds of digests:
//! - a **prehash** over the first [`PREHASH_SIZE`] bytes, used as a cheap
//!   pre-filter between files of the same size
//! - a **full hash** over the entire content, the authoritative identity check
//!
//! Both digests of a record are always produced by the same [`HashAlgorithm`].
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(HashAlgorithm::Blake3);
//! let prehash = hasher.prehash(Path::new("photo.jpg")).unwrap();
//! let full = hasher.full_hash(Path::new("photo.jpg")).unwrap();
//! println!("{prehash} {full}");
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as _, Sha256};

use super::AccessError;

/// Number of leading bytes covered by the prehash.
pub const PREHASH_SIZE: usize = 4096;

/// Read buffer size for streaming full hashes.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Files at least this large are hashed through a memory map (BLAKE3 only).
const MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Digest algorithm used for both prehash and full hash.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (default)
    #[default]
    Blake3,
    /// SHA-256
    Sha256,
    /// SHA-1
    Sha1,
    /// MD5, for inventories written by older tools
    Md5,
}

impl HashAlgorithm {
    /// Identifier stored in the inventory snapshot.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown algorithm identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hash algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            "sha1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Hex-encoded digest of file content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wrap a hex string, normalizing it to lowercase.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        let mut hex = hex.into();
        hex.make_ascii_lowercase();
        Self(hex)
    }

    /// The digest as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental state for one digest computation.
enum DigestState {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
    Sha1(Sha1),
    Md5(Md5),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    fn finalize(self) -> Digest {
        match self {
            Self::Blake3(h) => Digest::new(h.finalize().to_hex().to_string()),
            Self::Sha256(h) => Digest::new(format!("{:x}", h.finalize())),
            Self::Sha1(h) => Digest::new(format!("{:x}", h.finalize())),
            Self::Md5(h) => Digest::new(format!("{:x}", h.finalize())),
        }
    }
}

/// File hasher for prehash and full-content digests.
///
/// Cheap to clone; share one instance across worker threads.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            shutdown_flag: None,
        }
    }

    /// Abort long reads when the flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the first [`PREHASH_SIZE`] bytes of a file.
    ///
    /// Files shorter than the prefix are hashed in full, so for them the
    /// prehash equals the full hash.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] if the file cannot be opened or read.
    pub fn prehash(&self, path: &Path) -> Result<Digest, AccessError> {
        let file = File::open(path).map_err(|e| AccessError::from_io(path, e))?;
        let mut buffer = Vec::with_capacity(PREHASH_SIZE);
        file.take(PREHASH_SIZE as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| AccessError::from_io(path, e))?;

        let mut state = DigestState::new(self.algorithm);
        state.update(&buffer);
        Ok(state.finalize())
    }

    /// Hash the complete content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] if the file cannot be read, or
    /// [`AccessError::Interrupted`] if shutdown was requested mid-file.
    pub fn full_hash(&self, path: &Path) -> Result<Digest, AccessError> {
        if self.is_shutdown_requested() {
            return Err(AccessError::Interrupted(path.to_path_buf()));
        }

        if self.algorithm == HashAlgorithm::Blake3 {
            let len = std::fs::metadata(path)
                .map_err(|e| AccessError::from_io(path, e))?
                .len();
            if len >= MMAP_THRESHOLD {
                log::debug!(
                    "Hashing large file via mmap ({} MB): {}",
                    len / (1024 * 1024),
                    path.display()
                );
                let mut hasher = blake3::Hasher::new();
                hasher
                    .update_mmap(path)
                    .map_err(|e| AccessError::from_io(path, e))?;
                return Ok(Digest::new(hasher.finalize().to_hex().to_string()));
            }
        }

        let mut file = File::open(path).map_err(|e| AccessError::from_io(path, e))?;
        let mut state = DigestState::new(self.algorithm);
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            if self.is_shutdown_requested() {
                return Err(AccessError::Interrupted(path.to_path_buf()));
            }
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(AccessError::from_io(path, e)),
            };
            state.update(&buffer[..read]);
        }

        Ok(state.finalize())
    }
}
