use dupfinder::duplicates::{DuplicateFinder, FinderConfig};
use dupfinder::inventory::Inventory;
use dupfinder::progress::{Phase, ScanObserver};
use dupfinder::scanner::{HashAlgorithm, Walker, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn write_abc(dir: &Path) -> Vec<PathBuf> {
    let a = dir.join("a");
    let b = dir.join("b");
    let c = dir.join("c");
    fs::write(&a, "X".repeat(10)).unwrap();
    fs::write(&b, "X".repeat(10)).unwrap();
    fs::write(&c, "Y".repeat(10)).unwrap();
    vec![a, b, c]
}

#[test]
fn test_scan_empty_input() {
    let dir = tempdir().unwrap();
    let mut inventory = Inventory::new(Some(dir.path()));
    let finder = DuplicateFinder::with_defaults();

    let (groups, summary) = finder.find_duplicates(&[], &mut inventory).unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 0);
    assert_eq!(summary.duplicate_groups, 0);
}

#[test]
fn test_abc_scenario() {
    let dir = tempdir().unwrap();
    let files = write_abc(dir.path());
    let mut inventory = Inventory::new(Some(dir.path()));

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec!["a", "b"]);
    assert_eq!(groups[0].size, 10);
    assert_eq!(groups[0].algorithm, HashAlgorithm::Blake3);
    assert_eq!(groups[0].keep(), Some("a"));
    assert_eq!(summary.duplicate_files, 1);
    assert_eq!(summary.reclaimable_space, 10);
    // c shares the size but not the prehash
    assert_eq!(summary.fast_hashes_computed, 3);
    assert_eq!(summary.full_hashes_computed, 2);
    assert_eq!(summary.eliminated_by_prehash, 1);

    let c = inventory.get_key("c").unwrap();
    assert!(c.hash_fast.is_some());
    assert!(c.hash_full.is_none());
}

#[test]
fn test_walker_feeds_finder() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    fs::write(dir.path().join("one.txt"), "same content").unwrap();
    fs::write(nested.join("two.txt"), "same content").unwrap();
    fs::write(nested.join("skip.tmp"), "same content").unwrap();

    let walker = Walker::new(dir.path(), WalkerConfig::new(false, vec!["TMP".to_string()]));
    let (files, errors) = walker.collect_files();
    assert!(errors.is_empty());
    assert_eq!(files.len(), 2);

    let mut inventory = Inventory::new(Some(dir.path()));
    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec!["nested/two.txt", "one.txt"]);
}

#[test]
fn test_unique_sizes_are_never_hashed() {
    let dir = tempdir().unwrap();
    let files: Vec<PathBuf> = (1..=5)
        .map(|n| {
            let path = dir.path().join(format!("f{n}"));
            fs::write(&path, "z".repeat(n)).unwrap();
            path
        })
        .collect();
    let mut inventory = Inventory::new(Some(dir.path()));

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.eliminated_by_size, 5);
    assert_eq!(summary.hashes_computed(), 0);
    assert!(inventory.records().all(|(_, record)| !record.is_hashed()));
}

#[test]
fn test_second_run_reuses_persisted_digests() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let snapshot = state.path().join("inventory.json");
    let files = write_abc(dir.path());
    let finder = DuplicateFinder::with_defaults();

    let mut first = Inventory::new(Some(dir.path()));
    let (first_groups, first_summary) = finder.find_duplicates(&files, &mut first).unwrap();
    assert!(first_summary.hashes_computed() > 0);
    first.persist(&snapshot).unwrap();

    let mut second = Inventory::load(&snapshot, Some(dir.path())).unwrap();
    let (second_groups, second_summary) = finder.find_duplicates(&files, &mut second).unwrap();

    assert_eq!(second_summary.hashes_computed(), 0);
    assert_eq!(second_summary.fast_hashes_cached, 3);
    assert_eq!(second_summary.full_hashes_cached, 2);
    assert_eq!(first_groups, second_groups);
}

#[test]
fn test_algorithm_change_recomputes_digests() {
    let dir = tempdir().unwrap();
    let files = write_abc(dir.path());
    let mut inventory = Inventory::new(Some(dir.path()));

    let (blake, _) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();

    let sha = DuplicateFinder::new(FinderConfig::default().with_algorithm(HashAlgorithm::Sha256));
    let (groups, summary) = sha.find_duplicates(&files, &mut inventory).unwrap();

    assert_eq!(summary.algorithm_resets, 3);
    assert_eq!(summary.fast_hashes_cached, 0);
    assert_eq!(summary.fast_hashes_computed, 3);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].algorithm, HashAlgorithm::Sha256);
    assert_eq!(groups[0].paths, blake[0].paths);
    assert_ne!(groups[0].hash, blake[0].hash);
    assert_eq!(
        inventory.get_key("a").unwrap().alg,
        Some(HashAlgorithm::Sha256)
    );
}

#[test]
fn test_size_change_between_runs() {
    let dir = tempdir().unwrap();
    let files = write_abc(dir.path());
    let mut inventory = Inventory::new(Some(dir.path()));
    let finder = DuplicateFinder::with_defaults();
    finder.find_duplicates(&files, &mut inventory).unwrap();

    fs::write(&files[1], "X".repeat(11)).unwrap();
    let (groups, summary) = finder.find_duplicates(&files, &mut inventory).unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.stale_records, 1);
    let b = inventory.get_key("b").unwrap();
    assert_eq!(b.size, 11);
    assert!(!b.is_hashed());
    assert!(inventory.paths_with_size(11).unwrap().contains("b"));
    assert!(!inventory.paths_with_size(10).unwrap().contains("b"));
    assert!(inventory.indexes_consistent());
}

/// Deletes a file as soon as hashing starts.
struct Saboteur {
    victim: PathBuf,
}

impl ScanObserver for Saboteur {
    fn on_phase_start(&self, phase: Phase, _total: usize) {
        if phase == Phase::Prehash {
            let _ = fs::remove_file(&self.victim);
        }
    }
}

#[test]
fn test_file_vanishing_during_hashing() {
    let dir = tempdir().unwrap();
    let files: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            fs::write(&path, "same").unwrap();
            path
        })
        .collect();

    let observer = Arc::new(Saboteur {
        victim: files[1].clone(),
    });
    let finder = DuplicateFinder::new(FinderConfig::default().with_observer(observer));
    let mut inventory = Inventory::new(Some(dir.path()));

    let (groups, summary) = finder.find_duplicates(&files, &mut inventory).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec!["a", "c"]);
    assert_eq!(summary.vanished_files, 1);
    assert!(!inventory.contains(&files[1]));
    assert!(inventory.indexes_consistent());
}

#[test]
fn test_empty_files_opt_in() {
    let dir = tempdir().unwrap();
    let files: Vec<PathBuf> = ["e1", "e2"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            fs::write(&path, "").unwrap();
            path
        })
        .collect();

    let mut inventory = Inventory::new(Some(dir.path()));
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.empty_files, 2);

    let finder = DuplicateFinder::new(FinderConfig::default().with_include_empty(true));
    let (groups, _) = finder.find_duplicates(&files, &mut inventory).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 0);
}

#[test]
fn test_single_io_thread_matches_parallel() {
    let dir = tempdir().unwrap();
    let files: Vec<PathBuf> = (0..12)
        .map(|n| {
            let path = dir.path().join(format!("file{n:02}"));
            fs::write(&path, format!("content {}", n % 3)).unwrap();
            path
        })
        .collect();

    let mut serial_inventory = Inventory::new(Some(dir.path()));
    let serial = DuplicateFinder::new(FinderConfig::default().with_io_threads(1))
        .find_duplicates(&files, &mut serial_inventory)
        .unwrap()
        .0;

    let mut parallel_inventory = Inventory::new(Some(dir.path()));
    let parallel = DuplicateFinder::new(FinderConfig::default().with_io_threads(8))
        .find_duplicates(&files, &mut parallel_inventory)
        .unwrap()
        .0;

    assert_eq!(serial.len(), 3);
    assert_eq!(serial, parallel);
}

#[cfg(unix)]
#[test]
fn test_hardlinks_are_one_file() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original");
    fs::write(&original, "shared inode").unwrap();
    let link = dir.path().join("link");
    fs::hard_link(&original, &link).unwrap();
    let copy = dir.path().join("copy");
    fs::write(&copy, "shared inode").unwrap();

    let mut inventory = Inventory::new(Some(dir.path()));
    let files = vec![copy, link, original];
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();

    // "link" claims the inode first; "original" is its second name
    assert_eq!(summary.linked_files, 1);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec!["copy", "link"]);
    assert_eq!(summary.reclaimable_space, 12);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_name_is_skipped_not_vanished() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let odd = dir.path().join(OsStr::from_bytes(b"x\xff"));
    let plain = dir.path().join("y_copy");
    fs::write(&odd, "identical").unwrap();
    fs::write(&plain, "identical").unwrap();

    let mut inventory = Inventory::new(Some(dir.path()));
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[odd.clone(), plain], &mut inventory)
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.skipped_files, 1);
    assert_eq!(summary.hash_failures, 0);
    assert_eq!(summary.vanished_files, 0);
    assert_eq!(inventory.len(), 1);
    assert!(odd.exists());
}
