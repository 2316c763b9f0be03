//! In-memory shared store for tests and single-process hosts.

use super::{SharedStore, StoreError, StoreResult, StoredValue};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

type EntryMap = BTreeMap<(String, String), StoredValue>;

/// Mutex-guarded map keyed by `(partition, key)`.
///
/// When built with `with_partitions`, any other partition reports
/// `StoreError::Unavailable`, mirroring a missing shared container.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<EntryMap>,
    allowed_partitions: Option<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the store to the given partitions.
    pub fn with_partitions<I, P>(partitions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            entries: Mutex::new(EntryMap::new()),
            allowed_partitions: Some(partitions.into_iter().map(Into::into).collect()),
        }
    }

    /// Number of stored keys across all partitions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn check_partition(&self, partition: &str) -> StoreResult<()> {
        match &self.allowed_partitions {
            Some(allowed) if !allowed.contains(partition) => Err(StoreError::unavailable(
                partition,
                "partition is not configured for this store",
            )),
            _ => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryMap> {
        // Mutations are single inserts; a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SharedStore for MemoryStore {
    fn get_revision(&self, partition: &str, key: &str) -> StoreResult<Option<StoredValue>> {
        self.check_partition(partition)?;
        Ok(self
            .lock()
            .get(&(partition.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, partition: &str, key: &str, value: &str) -> StoreResult<()> {
        self.check_partition(partition)?;
        let mut entries = self.lock();
        let slot = (partition.to_string(), key.to_string());
        let revision = entries.get(&slot).map_or(1, |stored| stored.revision + 1);
        entries.insert(
            slot,
            StoredValue {
                value: value.to_string(),
                revision,
            },
        );
        Ok(())
    }

    fn compare_and_set(
        &self,
        partition: &str,
        key: &str,
        expected: Option<u64>,
        value: &str,
    ) -> StoreResult<bool> {
        self.check_partition(partition)?;
        let mut entries = self.lock();
        let slot = (partition.to_string(), key.to_string());
        let current = entries.get(&slot).map(|stored| stored.revision);
        if current != expected {
            return Ok(false);
        }

        entries.insert(
            slot,
            StoredValue {
                value: value.to_string(),
                revision: current.map_or(1, |revision| revision + 1),
            },
        );
        Ok(true)
    }
}
