use dupfinder::actions::{
    delete_duplicates, plan_deletions, validate_preserves_copy, DeleteConfig, DeleteError,
    PermanentRemover,
};
use dupfinder::duplicates::{DuplicateFinder, DuplicateGroup};
use dupfinder::inventory::Inventory;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn scan(dir: &Path, files: &[(&str, &str)]) -> (Vec<DuplicateGroup>, Inventory) {
    let paths: Vec<PathBuf> = files
        .iter()
        .map(|(name, content)| {
            let path = dir.join(name);
            fs::write(&path, content).unwrap();
            path
        })
        .collect();
    let mut inventory = Inventory::new(Some(dir));
    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(&paths, &mut inventory)
        .unwrap();
    (groups, inventory)
}

#[test]
fn test_abc_deletion_keeps_a() {
    let dir = tempdir().unwrap();
    let (groups, mut inventory) = scan(
        dir.path(),
        &[("a", "XXXXXXXXXX"), ("b", "XXXXXXXXXX"), ("c", "YYYYYYYYYY")],
    );

    let config = DeleteConfig::permanent();
    let result = delete_duplicates(&groups, &mut inventory, &PermanentRemover, &config, None);

    assert!(result.all_succeeded());
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.successes[0].key, "b");
    assert!(result.successes[0].permanent);
    assert_eq!(result.bytes_freed, 10);
    assert!(dir.path().join("a").exists());
    assert!(!dir.path().join("b").exists());
    assert!(dir.path().join("c").exists());
    assert!(inventory.get_key("b").is_none());
    assert!(inventory.indexes_consistent());
}

#[test]
fn test_kept_member_is_lexicographically_first() {
    let dir = tempdir().unwrap();
    let (groups, _) = scan(
        dir.path(),
        &[("zeta", "dup"), ("mid", "dup"), ("alpha", "dup")],
    );

    let plans = plan_deletions(&groups);
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].keep, "alpha");
    assert_eq!(plans[0].remove, vec!["mid", "zeta"]);
}

#[test]
fn test_modified_file_is_not_deleted() {
    let dir = tempdir().unwrap();
    let (groups, mut inventory) = scan(
        dir.path(),
        &[("a", "same"), ("b", "same"), ("c", "same")],
    );
    fs::write(dir.path().join("b"), "changed").unwrap();

    let config = DeleteConfig::permanent();
    let result = delete_duplicates(&groups, &mut inventory, &PermanentRemover, &config, None);

    assert_eq!(result.success_count(), 1);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.failures[0].0, dir.path().join("b"));
    assert!(dir.path().join("b").exists());
    assert!(!dir.path().join("c").exists());
    assert!(inventory.get_key("b").is_some());
}

#[test]
fn test_missing_kept_copy_blocks_group() {
    let dir = tempdir().unwrap();
    let (groups, mut inventory) = scan(dir.path(), &[("a", "same"), ("b", "same")]);
    fs::remove_file(dir.path().join("a")).unwrap();

    let config = DeleteConfig::permanent();
    let result = delete_duplicates(&groups, &mut inventory, &PermanentRemover, &config, None);

    assert_eq!(result.success_count(), 0);
    assert_eq!(result.failure_count(), 1);
    assert!(dir.path().join("b").exists());
}

#[test]
fn test_vanished_duplicate_leaves_inventory() {
    let dir = tempdir().unwrap();
    let (groups, mut inventory) = scan(dir.path(), &[("a", "same"), ("b", "same")]);
    fs::remove_file(dir.path().join("b")).unwrap();

    let config = DeleteConfig::permanent();
    let result = delete_duplicates(&groups, &mut inventory, &PermanentRemover, &config, None);

    assert_eq!(result.failure_count(), 1);
    assert!(inventory.get_key("b").is_none());
    assert!(inventory.get_key("a").is_some());
}

#[test]
fn test_stop_on_first_error() {
    let dir = tempdir().unwrap();
    let (groups, mut inventory) = scan(
        dir.path(),
        &[("a1", "one"), ("a2", "one"), ("b1", "two!"), ("b2", "two!")],
    );
    assert_eq!(groups.len(), 2);
    fs::remove_file(dir.path().join("a1")).unwrap();
    fs::remove_file(dir.path().join("b1")).unwrap();

    let config = DeleteConfig::permanent().with_continue_on_error(false);
    let result = delete_duplicates(&groups, &mut inventory, &PermanentRemover, &config, None);

    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.success_count(), 0);
    assert!(dir.path().join("a2").exists());
    assert!(dir.path().join("b2").exists());
}

#[test]
fn test_selection_must_preserve_a_copy() {
    let group = vec!["a".to_string(), "b".to_string()];
    assert!(validate_preserves_copy(&group[1..], &group).is_ok());
    assert!(matches!(
        validate_preserves_copy(&group, &group),
        Err(DeleteError::AllCopiesWouldBeDeleted)
    ));
}

#[test]
fn test_same_size_edit_after_cached_scan_is_not_deleted() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let snapshot = state.path().join("inventory.json");
    let files = [dir.path().join("a"), dir.path().join("b")];
    for path in &files {
        fs::write(path, "XXXXXXXXXX").unwrap();
    }
    let finder = DuplicateFinder::with_defaults();
    let mut first = Inventory::new(Some(dir.path()));
    finder.find_duplicates(&files, &mut first).unwrap();
    first.persist(&snapshot).unwrap();

    // Same size, so the cached digests are reused and the group survives
    fs::write(&files[1], "UNIQUEDATA").unwrap();
    let mut inventory = Inventory::load(&snapshot, Some(dir.path())).unwrap();
    let (groups, summary) = finder.find_duplicates(&files, &mut inventory).unwrap();
    assert_eq!(summary.hashes_computed(), 0);
    assert_eq!(groups.len(), 1);

    let config = DeleteConfig::permanent();
    let result = delete_duplicates(&groups, &mut inventory, &PermanentRemover, &config, None);

    assert_eq!(result.success_count(), 0);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(fs::read_to_string(&files[1]).unwrap(), "UNIQUEDATA");
    assert!(inventory.get_key("b").is_none());

    // The next scan hashes b again and no longer groups it
    let (groups, _) = finder.find_duplicates(&files, &mut inventory).unwrap();
    assert!(groups.is_empty());
}

#[cfg(unix)]
#[test]
fn test_followed_symlink_never_costs_the_target() {
    use dupfinder::scanner::{HashAlgorithm, Hasher, Walker, WalkerConfig};

    let dir = tempdir().unwrap();
    let target = dir.path().join("b");
    fs::write(&target, "precious").unwrap();
    std::os::unix::fs::symlink(&target, dir.path().join("a_link")).unwrap();

    let walker = Walker::new(dir.path(), WalkerConfig::new(true, Vec::new()));
    let (files, errors) = walker.collect_files();
    assert!(errors.is_empty());
    assert_eq!(files.len(), 2);

    let mut inventory = Inventory::new(Some(dir.path()));
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&files, &mut inventory)
        .unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.linked_files, 1);

    // A group carried over from elsewhere is still refused at deletion
    let stale = DuplicateGroup::new(
        Hasher::default().full_hash(&target).unwrap(),
        HashAlgorithm::Blake3,
        8,
        vec!["a_link".to_string(), "b".to_string()],
    );
    let config = DeleteConfig::permanent();
    let result = delete_duplicates(&[stale], &mut inventory, &PermanentRemover, &config, None);

    assert_eq!(result.success_count(), 0);
    assert!(matches!(
        result.failures.first(),
        Some((path, message)) if *path == target && message.contains("same file")
    ));
    assert_eq!(fs::read_to_string(&target).unwrap(), "precious");
    assert_eq!(fs::read_to_string(dir.path().join("a_link")).unwrap(), "precious");
}
