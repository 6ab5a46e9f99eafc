use clap::Parser;
use dupfinder::cli::{Cli, Commands};
use dupfinder::config::{Config, ENV_PREFIX};
use dupfinder::scanner::HashAlgorithm;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

// Environment variables are process-wide.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with(ENV_PREFIX) {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_missing_file_gives_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();

    let config = Config::load_from_path(dir.path().join("absent.toml"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_from_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
algorithm = "sha256"
io_threads = 8
include_empty = true
exclude_extensions = ["tmp", "part"]
inventory = "/var/lib/dupfinder/inventory.csv"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path));
    assert_eq!(config.algorithm, HashAlgorithm::Sha256);
    assert_eq!(config.io_threads, 8);
    assert!(config.include_empty);
    assert_eq!(config.exclude_extensions, vec!["tmp", "part"]);
    assert_eq!(
        config.inventory,
        Some(PathBuf::from("/var/lib/dupfinder/inventory.csv"))
    );
    assert!(!config.permanent);
}

#[test]
fn test_env_overrides_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "algorithm = \"sha256\"\nio_threads = 8\n").unwrap();

    std::env::set_var("DUPFINDER_ALGORITHM", "sha1");
    std::env::set_var("DUPFINDER_IO_THREADS", "16");
    let config = Config::load_from_path(&path);
    clear_env();

    assert_eq!(config.algorithm, HashAlgorithm::Sha1);
    assert_eq!(config.io_threads, 16);
}

#[test]
fn test_cli_overrides_config() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "algorithm = \"sha256\"\nfollow_symlinks = true\nexclude_extensions = [\"log\"]\n",
    )
    .unwrap();
    let mut config = Config::load(Some(&path));

    let cli = Cli::try_parse_from([
        "dupfinder",
        "scan",
        "/data",
        "--alg",
        "blake3",
        "--io-threads",
        "0",
        "--no-follow-symlinks",
        "-f",
        "inv.json",
    ])
    .unwrap();
    let Commands::Scan(args) = cli.command else {
        panic!("expected scan");
    };
    config.merge_scan_args(&args);

    assert_eq!(config.algorithm, HashAlgorithm::Blake3);
    assert_eq!(config.io_threads, 1);
    assert!(!config.follow_symlinks);
    assert_eq!(config.exclude_extensions, vec!["log"]);
    assert_eq!(config.inventory, Some(PathBuf::from("inv.json")));
}

#[test]
fn test_save_and_reload() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupfinder").join("config.toml");
    let config = Config {
        algorithm: HashAlgorithm::Sha1,
        permanent: true,
        ..Config::default()
    };

    config.save(&path).unwrap();
    assert_eq!(Config::load(Some(&path)), config);
}
