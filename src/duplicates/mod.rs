//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based elimination (stage 2)
//! - Prehash comparison (stage 3)
//! - Full hash confirmation (stage 4)
//! - Duplicate group management

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::DuplicateGroup;
