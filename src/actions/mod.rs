//! File actions module.
//!
//! Removes confirmed duplicates, keeping the first member of each group:
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (requires explicit configuration)
//! - Size and content verification to skip files changed since they were hashed
//! - Links to the kept copy are never removed
//!
//! ```no_run
//! use dupfinder::actions::{plan_deletions, DeleteConfig};
//!
//! # fn demo(groups: Vec<dupfinder::duplicates::DuplicateGroup>) {
//! for plan in plan_deletions(&groups) {
//!     println!("keep {}, remove {:?}", plan.keep, plan.remove);
//! }
//! # }
//! ```

pub mod delete;

pub use delete::{
    delete_duplicates, plan_deletions, validate_preserves_copy, BatchDeleteResult, DeleteConfig,
    DeleteError, DeleteResult, DeletionPlan, FileRemover, PermanentRemover, TrashRemover,
};
