//! Persistent file inventory.
//!
//! # Overview
//!
//! The [`Inventory`] remembers, for every file it has seen, the size and
//! any digests computed for it. It is loaded from a snapshot at the start
//! of a run, updated as the duplicate finder hashes files, and written back
//! at the end so the next run can skip work that is still valid.
//!
//! Records live in a primary store keyed by a normalized path string (see
//! [`path_utils`](crate::scanner::path_utils)). Three secondary indexes map
//! size, fast digest and full digest to the paths holding them; they are
//! derived data and are only ever changed together, by one routine, when a
//! record is inserted, updated or removed.
//!
//! # Snapshot formats
//!
//! The format follows the file extension: `.csv` or `.json`. See
//! [`snapshot`] for the layouts.
//!
//! # Example
//!
//! ```no_run
//! use dupfinder::inventory::Inventory;
//! use std::path::Path;
//!
//! let base = Path::new("/data");
//! let mut inventory = Inventory::load(Path::new("inventory.json"), Some(base))?;
//! inventory.add(Path::new("/data/a.bin"));
//! inventory.persist(Path::new("inventory.json"))?;
//! # Ok::<(), dupfinder::inventory::InventoryError>(())
//! ```

mod index;
mod record;
pub mod snapshot;
mod store;

use std::io;
use std::path::PathBuf;

pub use record::{AddOutcome, InventoryRecord, RecordUpdate};
pub use snapshot::SnapshotFormat;
pub use store::Inventory;

/// Errors raised by inventory operations.
#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    /// The snapshot has an unsupported extension or unreadable content.
    #[error("Invalid inventory {path}: {reason}")]
    Format {
        /// Snapshot path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Reading or writing the snapshot failed.
    #[error("I/O error for inventory {path}: {source}")]
    Io {
        /// Snapshot path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The path has no record.
    #[error("Path not in inventory: {0}")]
    UnknownPath(String),

    /// A full hash was supplied for a record with no fast hash.
    #[error("Full hash for {0} has no fast hash")]
    MissingFastHash(String),

    /// A digest was supplied for a record with no algorithm.
    #[error("Digest for {0} has no algorithm")]
    MissingAlgorithm(String),
}
