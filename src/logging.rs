//! Logging infrastructure for dupfinder.
//!
//! The library logs through the `log` facade only; this module installs the
//! `env_logger` backend for the binary. Log levels are determined by (in
//! priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (errors only) or `-v`/`-vv`/`-vvv`
//! 3. Default: warnings only, so results on stdout stay readable
//!
//! Verbosity flags only raise the level of this crate's own modules; other
//! crates stay at warning level.
//!
//! With `--log-file` the records are appended to that file instead of
//! stderr, each line timestamped.
//!
//! # Example
//!
//! ```rust,no_run
//! use dupfinder::logging::init_logging;
//! use std::path::Path;
//!
//! // Per-stage progress messages (-v), kept in a file
//! init_logging(1, false, Some(Path::new("dupfinder.log"))).unwrap();
//! log::info!("Application started");
//! ```

use env_logger::{Builder, Target, WriteStyle};
use log::LevelFilter;
use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Initialize the logging subsystem based on CLI flags.
///
/// Calling it again is harmless: the first logger stays installed.
///
/// # Errors
///
/// Returns an error if `log_file` cannot be opened for appending.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> io::Result<()> {
    let use_env = env::var("RUST_LOG").is_ok();
    let level = determine_level(verbose, quiet);
    let mut builder = build_logger(verbose, quiet, log_file)?;

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
        return Ok(());
    }
    if use_env {
        log::debug!(
            "Logging initialized from RUST_LOG: {:?}",
            env::var("RUST_LOG").ok()
        );
    } else {
        log::debug!("Logging initialized at level: {:?}", level);
    }
    if let Some(path) = log_file {
        log::debug!("Logging to {}", path.display());
    }
    Ok(())
}

/// Configure a logger without installing it.
fn build_logger(verbose: u8, quiet: bool, log_file: Option<&Path>) -> io::Result<Builder> {
    let level = determine_level(verbose, quiet);
    let mut builder = Builder::new();
    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder
            .filter_level(LevelFilter::Warn.min(level))
            .filter_module(env!("CARGO_CRATE_NAME"), level);
    }

    let to_file = log_file.is_some();
    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder
            .target(Target::Pipe(Box::new(file)))
            .write_style(WriteStyle::Never);
    }
    configure_format(&mut builder, verbose, to_file);
    Ok(builder)
}

/// Determine the log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the line format: a timestamp in debug builds or when writing to
/// a file, and the module path from `-vv` upwards.
fn configure_format(builder: &mut Builder, verbose: u8, to_file: bool) {
    let show_module = cfg!(debug_assertions) && verbose >= 2;
    let show_timestamp = cfg!(debug_assertions) || to_file;
    builder.format(move |buf, record| {
        if show_timestamp {
            let timestamp = buf.timestamp_seconds();
            write!(buf, "{timestamp} ")?;
        }
        let style = buf.default_level_style(record.level());
        write!(buf, "{style}{:<5}{style:#} ", record.level())?;
        if show_module {
            write!(buf, "[{}] ", record.module_path().unwrap_or("?"))?;
        }
        writeln!(buf, "{}", record.args())
    });
}

/// Name of the active maximum level, as accepted by `RUST_LOG`.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
