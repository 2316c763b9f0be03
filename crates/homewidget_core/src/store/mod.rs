//! Shared key/value store contracts.
//!
//! # Responsibility
//! - Define the capability both producer and renderer use to reach the
//!   shared partition (`SharedStore`).
//! - Provide a SQLite-backed app-group store and an in-memory store.
//!
//! # Invariants
//! - A write is atomic per `(partition, key)`; readers never see torn values.
//! - A successful `set` is visible to the next `get` in the same process.
//! - Every successful write bumps the key's revision.
//! - `Unavailable` is retryable and never fatal to the caller.

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod app_group;
mod memory;

pub use app_group::AppGroupStore;
pub use memory::MemoryStore;

static PARTITION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("valid partition id regex")
});

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared store failure.
#[derive(Debug)]
pub enum StoreError {
    /// The partition cannot be opened (missing container, bad id, ...).
    Unavailable { partition: String, reason: String },
    /// The backing database failed after the partition was opened.
    Db(DbError),
    /// A value could not be encoded for persistence.
    Encoding(String),
}

impl StoreError {
    pub(crate) fn unavailable(partition: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            partition: partition.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller should fall back to defaults and retry later.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { partition, reason } => {
                write!(f, "shared partition `{partition}` is unavailable: {reason}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::Encoding(details) => write!(f, "failed to encode shared value: {details}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable { .. } | Self::Encoding(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// A stored string together with its write revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub revision: u64,
}

/// Key/value capability over a shared partition.
pub trait SharedStore: Send + Sync {
    /// Reads the current value and its revision.
    fn get_revision(&self, partition: &str, key: &str) -> StoreResult<Option<StoredValue>>;

    /// Unconditionally replaces the value at `key`.
    fn set(&self, partition: &str, key: &str, value: &str) -> StoreResult<()>;

    /// Replaces the value only if the key is still at `expected` revision.
    ///
    /// `expected = None` means "only if the key is absent". Returns `false`
    /// when another writer got there first.
    fn compare_and_set(
        &self,
        partition: &str,
        key: &str,
        expected: Option<u64>,
        value: &str,
    ) -> StoreResult<bool>;

    /// Reads the current value.
    fn get(&self, partition: &str, key: &str) -> StoreResult<Option<String>> {
        Ok(self.get_revision(partition, key)?.map(|stored| stored.value))
    }
}

impl<T: SharedStore + ?Sized> SharedStore for Arc<T> {
    fn get_revision(&self, partition: &str, key: &str) -> StoreResult<Option<StoredValue>> {
        (**self).get_revision(partition, key)
    }

    fn set(&self, partition: &str, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(partition, key, value)
    }

    fn compare_and_set(
        &self,
        partition: &str,
        key: &str,
        expected: Option<u64>,
        value: &str,
    ) -> StoreResult<bool> {
        (**self).compare_and_set(partition, key, expected, value)
    }

    fn get(&self, partition: &str, key: &str) -> StoreResult<Option<String>> {
        (**self).get(partition, key)
    }
}

/// Returns whether `partition` is a usable app-group style identifier.
pub fn is_valid_partition_id(partition: &str) -> bool {
    PARTITION_ID_RE.is_match(partition)
}

#[cfg(test)]
mod tests {
    use super::is_valid_partition_id;

    #[test]
    fn accepts_app_group_identifiers() {
        assert!(is_valid_partition_id("group.com.efeapps.hydrodaily"));
        assert!(is_valid_partition_id("group.tunahanoguz.pizzatracker"));
        assert!(is_valid_partition_id("local-test_1"));
    }

    #[test]
    fn rejects_blank_or_path_like_identifiers() {
        assert!(!is_valid_partition_id(""));
        assert!(!is_valid_partition_id("   "));
        assert!(!is_valid_partition_id("../escape"));
        assert!(!is_valid_partition_id("group/com"));
        assert!(!is_valid_partition_id(".hidden"));
    }
}
