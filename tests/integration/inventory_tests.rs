use dupfinder::inventory::{AddOutcome, Inventory, InventoryError, RecordUpdate};
use dupfinder::scanner::{Digest, HashAlgorithm};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn digest(c: char) -> Digest {
    Digest::new(c.to_string().repeat(64))
}

/// Inventory with hashed, half-hashed and unhashed records.
fn sample(dir: &Path) -> Inventory {
    let mut inventory = Inventory::new(Some(dir));
    for (name, content) in [("a", "1234"), ("b", "1234"), ("c", "5678"), ("d", "xy")] {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        inventory.add(&path);
    }
    let alg = HashAlgorithm::Blake3;
    for key in ["a", "b"] {
        inventory
            .update_key(
                key,
                RecordUpdate::new()
                    .with_alg(alg)
                    .with_hash_fast(digest('f'))
                    .with_hash_full(digest('e')),
            )
            .unwrap();
    }
    inventory
        .update_key(
            "c",
            RecordUpdate::new().with_alg(alg).with_hash_fast(digest('0')),
        )
        .unwrap();
    inventory
}

fn buckets(inventory: &Inventory) -> (Vec<(u64, BTreeSet<String>)>, Vec<(Digest, BTreeSet<String>)>, Vec<(Digest, BTreeSet<String>)>) {
    let mut sizes: Vec<_> = inventory
        .groups_by_size()
        .map(|(size, paths)| (size, paths.clone()))
        .collect();
    let mut fast: Vec<_> = inventory
        .groups_by_fast_hash()
        .map(|(d, paths)| (d.clone(), paths.clone()))
        .collect();
    let mut full: Vec<_> = inventory
        .groups_by_full_hash()
        .map(|(d, paths)| (d.clone(), paths.clone()))
        .collect();
    sizes.sort();
    fast.sort();
    full.sort();
    (sizes, fast, full)
}

fn assert_round_trip(file_name: &str) {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let snapshot = state.path().join(file_name);
    let original = sample(dir.path());

    original.persist(&snapshot).unwrap();
    let loaded = Inventory::load(&snapshot, Some(dir.path())).unwrap();

    let before: Vec<_> = original.records().collect();
    let after: Vec<_> = loaded.records().collect();
    assert_eq!(before, after);
    assert_eq!(buckets(&original), buckets(&loaded));
    assert!(loaded.indexes_consistent());
}

#[test]
fn test_csv_round_trip() {
    assert_round_trip("inventory.csv");
}

#[test]
fn test_json_round_trip() {
    assert_round_trip("inventory.json");
}

#[test]
fn test_snapshot_format_follows_extension() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let inventory = sample(dir.path());

    let csv = state.path().join("inv.csv");
    inventory.persist(&csv).unwrap();
    let text = fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("path,size,hash_fast,hash_full,alg"));
    assert!(text.contains("d,2,,,"));

    let json = state.path().join("inv.json");
    inventory.persist(&json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["a"]["size"], 4);
    assert_eq!(value["a"]["alg"], "blake3");
    assert!(value["d"].get("hash_fast").is_none());
}

#[test]
fn test_missing_snapshot_is_empty() {
    let state = tempdir().unwrap();
    let inventory = Inventory::load(&state.path().join("absent.json"), None).unwrap();
    assert!(inventory.is_empty());
}

#[test]
fn test_corrupt_snapshot_is_format_error() {
    let state = tempdir().unwrap();
    let json = state.path().join("inv.json");
    fs::write(&json, "{ not json").unwrap();
    assert!(matches!(
        Inventory::load(&json, None),
        Err(InventoryError::Format { .. })
    ));

    let csv = state.path().join("inv.csv");
    fs::write(&csv, "path,size,hash_fast,hash_full,alg\na,notanumber,,,\n").unwrap();
    assert!(matches!(
        Inventory::load(&csv, None),
        Err(InventoryError::Format { .. })
    ));
}

#[test]
fn test_unknown_extension_is_format_error() {
    let state = tempdir().unwrap();
    let path = state.path().join("inv.txt");
    fs::write(&path, "").unwrap();
    assert!(matches!(
        Inventory::load(&path, None),
        Err(InventoryError::Format { .. })
    ));
    assert!(matches!(
        Inventory::new(None).persist(&path),
        Err(InventoryError::Format { .. })
    ));
}

#[test]
fn test_size_change_invalidates_and_relocates() {
    let dir = tempdir().unwrap();
    let mut inventory = sample(dir.path());
    let a = dir.path().join("a");

    fs::write(&a, "123456").unwrap();
    let outcome = inventory.add(&a);
    assert!(outcome.is_stale());
    assert!(matches!(
        outcome,
        AddOutcome::Present {
            recorded: 4,
            on_disk: 6
        }
    ));

    inventory
        .update(&a, RecordUpdate::new().with_size(6))
        .unwrap();

    let record = inventory.get(&a).unwrap();
    assert_eq!(record.size, 6);
    assert!(record.hash_fast.is_none());
    assert!(record.hash_full.is_none());
    assert!(inventory.paths_with_size(6).unwrap().contains("a"));
    assert!(!inventory.paths_with_size(4).unwrap().contains("a"));

    let fast: Vec<_> = inventory
        .groups_by_fast_hash()
        .filter(|(d, _)| **d == digest('f'))
        .map(|(_, paths)| paths.clone())
        .collect();
    assert_eq!(fast, vec![BTreeSet::from(["b".to_string()])]);
    assert!(inventory.indexes_consistent());
}

#[test]
fn test_new_fast_hash_clears_full_hash() {
    let dir = tempdir().unwrap();
    let mut inventory = sample(dir.path());

    inventory
        .update_key("a", RecordUpdate::new().with_hash_fast(digest('9')))
        .unwrap();

    let record = inventory.get_key("a").unwrap();
    assert_eq!(record.hash_fast, Some(digest('9')));
    assert!(record.hash_full.is_none());
    assert!(inventory
        .groups_by_full_hash()
        .all(|(_, paths)| !paths.contains("a")));
}

#[test]
fn test_invalid_updates_are_rejected() {
    let dir = tempdir().unwrap();
    let mut inventory = sample(dir.path());

    let err = inventory
        .update_key(
            "d",
            RecordUpdate::new()
                .with_alg(HashAlgorithm::Blake3)
                .with_hash_full(digest('e')),
        )
        .unwrap_err();
    assert!(matches!(err, InventoryError::MissingFastHash(_)));

    let err = inventory
        .update_key("d", RecordUpdate::new().with_hash_fast(digest('f')))
        .unwrap_err();
    assert!(matches!(err, InventoryError::MissingAlgorithm(_)));

    assert!(!inventory.get_key("d").unwrap().is_hashed());
    assert!(inventory.indexes_consistent());
}

#[test]
fn test_update_unknown_path() {
    let dir = tempdir().unwrap();
    let mut inventory = Inventory::new(Some(dir.path()));
    let err = inventory
        .update(&dir.path().join("ghost"), RecordUpdate::new().with_size(1))
        .unwrap_err();
    assert!(matches!(err, InventoryError::UnknownPath(ref key) if key == "ghost"));
}

#[test]
fn test_remove_and_prune() {
    let dir = tempdir().unwrap();
    let mut inventory = sample(dir.path());

    assert!(inventory.remove(&dir.path().join("d")).is_some());
    assert!(inventory.remove(&dir.path().join("d")).is_none());
    assert!(inventory.paths_with_size(2).is_none());

    fs::remove_file(dir.path().join("c")).unwrap();
    assert_eq!(inventory.prune_missing(), 1);
    assert_eq!(inventory.len(), 2);
    assert!(inventory
        .groups_by_fast_hash()
        .all(|(d, _)| *d != digest('0')));
    assert!(inventory.indexes_consistent());
}

#[test]
fn test_skipped_path_is_not_recorded() {
    let dir = tempdir().unwrap();
    let mut inventory = Inventory::new(Some(dir.path()));

    let outcome = inventory.add(&dir.path().join("missing"));
    assert!(matches!(outcome, AddOutcome::Skipped(ref e) if e.is_not_found()));

    fs::create_dir(dir.path().join("sub")).unwrap();
    assert!(matches!(
        inventory.add(&dir.path().join("sub")),
        AddOutcome::Skipped(_)
    ));
    assert!(inventory.is_empty());
}

#[test]
fn test_keys_are_relative_to_base() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let file = sub.join("f.txt");
    fs::write(&file, "abc").unwrap();

    let mut inventory = Inventory::new(Some(dir.path()));
    inventory.add(&sub.join("..").join("sub").join("f.txt"));

    assert_eq!(inventory.key_for(&file), "sub/f.txt");
    assert!(inventory.get_key("sub/f.txt").is_some());
    assert_eq!(inventory.resolve("sub/f.txt"), file);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_name_is_skipped() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let first = dir.path().join(OsStr::from_bytes(b"x\xff"));
    let second = dir.path().join(OsStr::from_bytes(b"x\xfe"));
    fs::write(&first, "one").unwrap();
    fs::write(&second, "two").unwrap();
    let mut inventory = Inventory::new(Some(dir.path()));

    for path in [&first, &second] {
        match inventory.add(path) {
            AddOutcome::Skipped(e) => {
                assert_eq!(e.path(), path.as_path());
                assert!(e.to_string().contains("UTF-8"));
            }
            other => panic!("expected a skip, got {other:?}"),
        }
    }
    assert!(inventory.is_empty());
}
