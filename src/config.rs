//! Application configuration management.
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. The TOML config file (platform config dir, or `--config`)
//! 3. `DUPFINDER_*` environment variables
//! 4. Command-line flags
//!
//! ```toml
//! algorithm = "sha256"
//! io_threads = 8
//! exclude_extensions = ["tmp", "part"]
//! inventory = "/home/me/.local/share/dupfinder/inventory.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::ScanArgs;
use crate::scanner::HashAlgorithm;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPFINDER_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Number of hashing threads.
    pub io_threads: usize,
    /// Treat empty files as duplicates of each other.
    pub include_empty: bool,
    /// Extensions skipped during the walk.
    pub exclude_extensions: Vec<String>,
    /// Follow symbolic links during the walk.
    pub follow_symlinks: bool,
    /// Inventory file used when `--inventory` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,
    /// Delete permanently instead of moving to trash.
    pub permanent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            io_threads: 4,
            include_empty: false,
            exclude_extensions: Vec::new(),
            follow_symlinks: false,
            inventory: None,
            permanent: false,
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or the default location.
    ///
    /// Invalid or unreadable files are reported and ignored.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from_path(path),
            None => {
                log::debug!("No config directory available, using defaults");
                Self::from_figment(Self::figment())
            }
        }
    }

    /// Load the configuration from a specific TOML file.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            log::debug!("Loading config from {}", path.display());
        }
        Self::from_figment(Self::figment().merge(Toml::file(path)).merge(Self::env()))
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX)
    }

    fn from_figment(figment: Figment) -> Self {
        match figment.extract::<Self>() {
            Ok(config) => config.normalized(),
            Err(e) => {
                log::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    fn normalized(mut self) -> Self {
        self.io_threads = self.io_threads.max(1);
        self
    }

    /// Apply scan flags on top of the loaded configuration.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if let Some(algorithm) = args.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = threads.max(1);
        }
        if args.include_empty {
            self.include_empty = true;
        }
        if !args.exclude_extensions.is_empty() {
            self.exclude_extensions = args.exclude_extensions.clone();
        }
        if args.follow_symlinks {
            self.follow_symlinks = true;
        } else if args.no_follow_symlinks {
            self.follow_symlinks = false;
        }
        if let Some(ref inventory) = args.inventory {
            self.inventory = Some(inventory.clone());
        }
        if args.permanent {
            self.permanent = true;
        }
    }

    /// Save the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "dupfinder", "dupfinder")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
