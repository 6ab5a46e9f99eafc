//! Secondary indexes over the inventory's primary store.
//!
//! Each index maps a record field (size, fast digest, full digest) to the
//! set of path keys holding that value. [`Indexes::relocate`] is the only
//! place buckets change; the store calls it with the before and after
//! state of a record so every index moves together.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use super::record::InventoryRecord;
use crate::scanner::Digest;

/// Bucketed path sets keyed by size and digest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Indexes {
    pub(crate) by_size: HashMap<u64, BTreeSet<String>>,
    pub(crate) by_fast: HashMap<Digest, BTreeSet<String>>,
    pub(crate) by_full: HashMap<Digest, BTreeSet<String>>,
}

impl Indexes {
    /// Build indexes from scratch.
    pub(crate) fn rebuild<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a InventoryRecord)>,
    {
        let mut indexes = Self::default();
        for (key, record) in records {
            indexes.relocate(key, None, Some(record));
        }
        indexes
    }

    /// Move `key` from the buckets of `old` to those of `new`.
    ///
    /// `None` on either side means the record is absent (insertion or
    /// removal). Buckets left empty are dropped.
    pub(crate) fn relocate(
        &mut self,
        key: &str,
        old: Option<&InventoryRecord>,
        new: Option<&InventoryRecord>,
    ) {
        move_between(
            &mut self.by_size,
            key,
            old.map(|r| &r.size),
            new.map(|r| &r.size),
        );
        move_between(
            &mut self.by_fast,
            key,
            old.and_then(|r| r.hash_fast.as_ref()),
            new.and_then(|r| r.hash_fast.as_ref()),
        );
        move_between(
            &mut self.by_full,
            key,
            old.and_then(|r| r.hash_full.as_ref()),
            new.and_then(|r| r.hash_full.as_ref()),
        );
    }
}

fn move_between<K>(map: &mut HashMap<K, BTreeSet<String>>, key: &str, from: Option<&K>, to: Option<&K>)
where
    K: Hash + Eq + Clone,
{
    if from == to {
        return;
    }
    if let Some(from) = from {
        if let Some(bucket) = map.get_mut(from) {
            bucket.remove(key);
            if bucket.is_empty() {
                map.remove(from);
            }
        }
    }
    if let Some(to) = to {
        map.entry(to.clone()).or_default().insert(key.to_string());
    }
}
