//! Confirmed duplicate groups.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] is the final product of detection: two or more
//! inventory keys whose files share a size and a full-content digest under
//! one algorithm. Members are kept in lexicographic order, so the first
//! member is the one a deletion pass keeps.
//!
//! # Example
//!
//! ```
//! use dupfinder::duplicates::DuplicateGroup;
//! use dupfinder::scanner::{Digest, HashAlgorithm};
//!
//! let group = DuplicateGroup::new(
//!     Digest::new("abc123"),
//!     HashAlgorithm::Blake3,
//!     1024,
//!     vec!["b.txt".to_string(), "a.txt".to_string()],
//! );
//!
//! assert_eq!(group.keep(), Some("a.txt"));
//! assert_eq!(group.duplicates(), ["b.txt".to_string()]);
//! assert_eq!(group.wasted_space(), 1024);
//! ```

use serde::{Deserialize, Serialize};

use crate::scanner::{Digest, HashAlgorithm};

/// Files confirmed identical by full-content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Full-content digest shared by every member
    pub hash: Digest,
    /// Algorithm that produced `hash`
    pub algorithm: HashAlgorithm,
    /// File size in bytes
    pub size: u64,
    /// Inventory keys, sorted
    pub paths: Vec<String>,
}

impl DuplicateGroup {
    /// Create a group, sorting and deduplicating its members.
    #[must_use]
    pub fn new(hash: Digest, algorithm: HashAlgorithm, size: u64, mut paths: Vec<String>) -> Self {
        paths.sort();
        paths.dedup();
        Self {
            hash,
            algorithm,
            size,
            paths,
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// The member that survives deletion.
    #[must_use]
    pub fn keep(&self) -> Option<&str> {
        self.paths.first().map(String::as_str)
    }

    /// Members scheduled for removal.
    #[must_use]
    pub fn duplicates(&self) -> &[String] {
        self.paths.get(1..).unwrap_or_default()
    }

    /// Number of redundant copies.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Total size of all members.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.paths.len() as u64
    }

    /// Space held by redundant copies.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }
}
