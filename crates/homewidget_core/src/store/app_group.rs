//! SQLite-backed app-group store.
//!
//! # Responsibility
//! - Map each partition to `<container_root>/<partition>/shared.sqlite3`.
//! - Keep one open connection per partition for the life of the store.
//!
//! # Invariants
//! - The container root is never created here; its absence means the
//!   shared configuration is missing and the partition is `Unavailable`.
//! - Every write is one SQL statement, so it is atomic per key.

use super::{is_valid_partition_id, SharedStore, StoreError, StoreResult, StoredValue};
use crate::db::open_db;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const PARTITION_DB_FILE_NAME: &str = "shared.sqlite3";

/// Shared store persisted in per-partition SQLite files.
pub struct AppGroupStore {
    container_root: PathBuf,
    connections: Mutex<HashMap<String, Connection>>,
}

impl AppGroupStore {
    /// Creates a store rooted at the shared container directory.
    ///
    /// Nothing is opened until the first access to a partition.
    pub fn new(container_root: impl Into<PathBuf>) -> Self {
        Self {
            container_root: container_root.into(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn container_root(&self) -> &Path {
        &self.container_root
    }

    /// Path of the database file backing `partition`.
    pub fn partition_path(&self, partition: &str) -> PathBuf {
        self.container_root
            .join(partition)
            .join(PARTITION_DB_FILE_NAME)
    }

    fn with_partition<T>(
        &self,
        partition: &str,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut connections = self.lock();
        if !connections.contains_key(partition) {
            let conn = self.open_partition(partition)?;
            connections.insert(partition.to_string(), conn);
        }

        match connections.get(partition) {
            Some(conn) => f(conn),
            None => Err(StoreError::unavailable(partition, "connection cache miss")),
        }
    }

    fn open_partition(&self, partition: &str) -> StoreResult<Connection> {
        if !is_valid_partition_id(partition) {
            return Err(StoreError::unavailable(partition, "invalid partition id"));
        }
        if !self.container_root.is_dir() {
            warn!(
                "event=partition_open module=store status=error partition={} error_code=container_missing",
                partition
            );
            return Err(StoreError::unavailable(
                partition,
                format!(
                    "container root `{}` does not exist",
                    self.container_root.display()
                ),
            ));
        }

        let path = self.partition_path(partition);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|err| {
                StoreError::unavailable(
                    partition,
                    format!("failed to create `{}`: {err}", dir.display()),
                )
            })?;
        }

        let conn = open_db(&path)
            .map_err(|err| StoreError::unavailable(partition, format!("open failed: {err}")))?;
        debug!(
            "event=partition_open module=store status=ok partition={}",
            partition
        );
        Ok(conn)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SharedStore for AppGroupStore {
    fn get_revision(&self, partition: &str, key: &str) -> StoreResult<Option<StoredValue>> {
        self.with_partition(partition, |conn| {
            let row = conn
                .query_row(
                    "SELECT value, revision
                     FROM shared_entries
                     WHERE partition = ?1 AND key = ?2;",
                    params![partition, key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;

            Ok(row.map(|(value, revision)| StoredValue {
                value,
                revision: revision_from_db(revision),
            }))
        })
    }

    fn set(&self, partition: &str, key: &str, value: &str) -> StoreResult<()> {
        self.with_partition(partition, |conn| {
            conn.execute(
                "INSERT INTO shared_entries (partition, key, value, revision)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT (partition, key) DO UPDATE SET
                    value = excluded.value,
                    revision = shared_entries.revision + 1,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![partition, key, value],
            )?;
            Ok(())
        })
    }

    fn compare_and_set(
        &self,
        partition: &str,
        key: &str,
        expected: Option<u64>,
        value: &str,
    ) -> StoreResult<bool> {
        self.with_partition(partition, |conn| {
            let changed = match expected {
                None => conn.execute(
                    "INSERT INTO shared_entries (partition, key, value, revision)
                     VALUES (?1, ?2, ?3, 1)
                     ON CONFLICT (partition, key) DO NOTHING;",
                    params![partition, key, value],
                )?,
                Some(revision) => {
                    let Ok(revision) = i64::try_from(revision) else {
                        return Ok(false);
                    };
                    conn.execute(
                        "UPDATE shared_entries
                         SET
                            value = ?3,
                            revision = revision + 1,
                            updated_at = (strftime('%s', 'now') * 1000)
                         WHERE partition = ?1 AND key = ?2 AND revision = ?4;",
                        params![partition, key, value, revision],
                    )?
                }
            };
            Ok(changed == 1)
        })
    }
}

fn revision_from_db(value: i64) -> u64 {
    // Schema CHECK keeps revision >= 1.
    u64::try_from(value).unwrap_or(0)
}
