//! dupfinder - duplicate file finder with a persistent hash inventory
//!
//! Candidates are narrowed by size, then by a digest of their first 4 KiB,
//! then by a digest of their full content. Every digest is recorded in an
//! [`inventory::Inventory`] that can be saved as CSV or JSON, so a later
//! run only reads files that are new or have changed size.

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

pub use app::run_app;
