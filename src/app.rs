//! Application shell: wires the CLI, configuration and library together.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;

use crate::actions::{delete_duplicates, DeleteConfig};
use crate::cli::{Cli, Commands, PruneArgs, ScanArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig, FinderError, ScanSummary};
use crate::error::ExitCode;
use crate::inventory::{snapshot, Inventory};
use crate::logging;
use crate::progress::{Progress, ScanObserver};
use crate::scanner::{Walker, WalkerConfig};
use crate::signal::{self, ShutdownHandler};

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for failures that abort the run: an unreadable scan
/// root, a corrupt inventory, or an inventory that cannot be saved.
/// Per-file failures are logged and reflected in the exit code instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let log_file = cli.log_file.as_deref();
    logging::init_logging(cli.verbose, cli.quiet, log_file).with_context(|| {
        format!(
            "Cannot open log file {}",
            log_file.unwrap_or(Path::new("-")).display()
        )
    })?;
    log::debug!(
        "dupfinder {} (log level {})",
        env!("CARGO_PKG_VERSION"),
        logging::current_level_name()
    );

    let mut config = Config::load(cli.config.as_deref());
    match cli.command {
        Commands::Scan(ref args) => {
            config.merge_scan_args(args);
            if args.save_config {
                save_config(cli.config.as_deref(), &config)?;
            }
            run_scan(args, &config, cli.quiet)
        }
        Commands::Prune(ref args) => run_prune(args, &config, cli.quiet),
    }
}

fn run_scan(args: &ScanArgs, config: &Config, quiet: bool) -> Result<ExitCode> {
    let shutdown = signal::install_handler().unwrap_or_else(|e| {
        log::warn!("{}; Ctrl+C will not save the inventory", e);
        ShutdownHandler::new()
    });

    let root = canonical_root(&args.path)?;
    let walker = Walker::new(
        &root,
        WalkerConfig::new(config.follow_symlinks, config.exclude_extensions.clone()),
    )
    .with_shutdown_flag(shutdown.get_flag());
    walker.validate_root()?;

    let (mut files, walk_errors) = walker.collect_files();
    if shutdown.is_shutdown_requested() {
        log::warn!("Interrupted during directory walk");
        return Ok(ExitCode::Interrupted);
    }
    if let Some(ref inventory) = config.inventory {
        exclude_inventory_files(&mut files, inventory);
    }

    let observer: Arc<dyn ScanObserver> = Arc::new(Progress::new(quiet));
    let mut inventory = open_inventory(config.inventory.as_deref(), &root)?
        .with_observer(Arc::clone(&observer));

    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_algorithm(config.algorithm)
            .with_io_threads(config.io_threads)
            .with_include_empty(config.include_empty)
            .with_shutdown_flag(shutdown.get_flag())
            .with_observer(Arc::clone(&observer)),
    );

    let (groups, summary) = match finder.find_duplicates(&files, &mut inventory) {
        Ok(found) => found,
        Err(FinderError::Interrupted) => {
            save_inventory(config.inventory.as_deref(), &inventory)?;
            log::warn!("Scan interrupted; completed hashes were kept");
            return Ok(ExitCode::Interrupted);
        }
        Err(e) => return Err(e.into()),
    };

    print_groups(&groups, &inventory).context("Failed to write results")?;
    if !quiet {
        print_summary(&summary);
    }

    let mut delete_failures = 0;
    if args.delete && !groups.is_empty() {
        let delete_config = if config.permanent {
            DeleteConfig::permanent()
        } else {
            DeleteConfig::trash()
        };
        let remover = delete_config.remover();
        let result = delete_duplicates(
            &groups,
            &mut inventory,
            remover.as_ref(),
            &delete_config,
            Some(observer.as_ref()),
        );
        for (path, message) in &result.failures {
            log::warn!("Could not delete {}: {}", path.display(), message);
        }
        if !quiet {
            eprintln!("{}", result.summary());
        }
        delete_failures = result.failure_count();
    }

    save_inventory(config.inventory.as_deref(), &inventory)?;

    let had_errors = !walk_errors.is_empty()
        || summary.skipped_files > 0
        || summary.hash_failures > 0
        || delete_failures > 0;
    Ok(if had_errors {
        ExitCode::PartialSuccess
    } else if groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    })
}

fn run_prune(args: &PruneArgs, config: &Config, quiet: bool) -> Result<ExitCode> {
    let source = args
        .inventory
        .as_deref()
        .or(config.inventory.as_deref())
        .context("No inventory file given; use --inventory or set `inventory` in the config")?;
    let base = canonical_root(&args.path)?;

    let mut inventory = open_inventory(Some(source), &base)?;
    let removed = inventory.prune_missing();
    save_inventory(Some(source), &inventory)?;

    if !quiet {
        eprintln!(
            "Pruned {} record(s); {} remaining",
            removed,
            inventory.len()
        );
    }
    Ok(ExitCode::Success)
}

/// Drop the inventory snapshot and its temporary sibling from the walk.
fn exclude_inventory_files(files: &mut Vec<PathBuf>, inventory: &Path) {
    let Some(name) = inventory.file_name() else {
        return;
    };
    let parent = match inventory.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let Ok(parent) = parent.canonicalize() else {
        return;
    };
    let own = [
        parent.join(name),
        snapshot::temp_sibling(&parent.join(name)),
    ];
    let before = files.len();
    files.retain(|f| !own.contains(f));
    if files.len() != before {
        log::debug!("Inventory file left out of the scan");
    }
}

fn save_config(path: Option<&Path>, config: &Config) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(Config::default_path)
        .context("No config directory available; use --config")?;
    config.save(&path)?;
    log::info!("Saved configuration to {}", path.display());
    Ok(())
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))
}

fn open_inventory(source: Option<&Path>, base: &Path) -> Result<Inventory> {
    match source {
        Some(source) => {
            let inventory = Inventory::load(source, Some(base))
                .with_context(|| format!("Failed to load inventory {}", source.display()))?;
            log::info!(
                "Loaded {} record(s) from {}",
                inventory.len(),
                source.display()
            );
            Ok(inventory)
        }
        None => Ok(Inventory::new(Some(base))),
    }
}

fn save_inventory(destination: Option<&Path>, inventory: &Inventory) -> Result<()> {
    if let Some(destination) = destination {
        inventory
            .persist(destination)
            .with_context(|| format!("Failed to save inventory {}", destination.display()))?;
    }
    Ok(())
}

fn print_groups(groups: &[DuplicateGroup], inventory: &Inventory) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for group in groups {
        writeln!(
            out,
            "{} {} x{} ({})",
            group.algorithm,
            group.hash.short(),
            group.len(),
            ByteSize::b(group.size)
        )?;
        for key in &group.paths {
            writeln!(out, "  {}", inventory.resolve(key).display())?;
        }
    }
    out.flush()
}

fn print_summary(summary: &ScanSummary) {
    eprintln!(
        "{} file(s), {} scanned in {:.2?}",
        summary.total_files,
        summary.total_size_display(),
        summary.scan_duration
    );
    eprintln!(
        "{} hash(es) computed, {} reused from inventory",
        summary.hashes_computed(),
        summary.fast_hashes_cached + summary.full_hashes_cached
    );
    eprintln!(
        "{} duplicate group(s), {} redundant file(s), {} reclaimable ({:.1}%)",
        summary.duplicate_groups,
        summary.duplicate_files,
        summary.reclaimable_display(),
        summary.wasted_percentage()
    );
}
