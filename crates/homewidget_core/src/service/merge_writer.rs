//! Merge-write use-case for shared documents.
//!
//! # Responsibility
//! - Shallow-merge a producer's partial JSON document into the stored one.
//! - Reject non-object payloads before touching the store.
//!
//! # Invariants
//! - A rejected payload never causes a write; the prior value is retained.
//! - Keys present only in the stored document survive every merge.
//! - Read-modify-write is an optimistic compare-and-swap loop: a writer that
//!   loses a race re-reads and re-merges instead of overwriting the winner.
//! - Unreadable stored values merge as `{}` and are replaced by the write.

use crate::model::document::{
    merge_documents, parse_document, parse_stored_or_empty, to_stored_string, Document,
    DocumentError,
};
use crate::store::{SharedStore, StoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of compare-and-swap attempts per merge-write.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Merge-write failure.
#[derive(Debug)]
pub enum WriteError {
    /// Incoming payload is not a JSON object; nothing was written.
    InvalidDocument(DocumentError),
    /// Serialization or the underlying store failed.
    StoreFailure(StoreError),
    /// Every attempt lost a race against another writer.
    Contended { attempts: u32 },
}

impl WriteError {
    /// Whether the failure came from an unopenable partition.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreFailure(err) if err.is_unavailable())
    }
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDocument(err) => write!(f, "{err}"),
            Self::StoreFailure(err) => write!(f, "shared store write failed: {err}"),
            Self::Contended { attempts } => {
                write!(f, "merge-write lost {attempts} consecutive races")
            }
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDocument(err) => Some(err),
            Self::StoreFailure(err) => Some(err),
            Self::Contended { .. } => None,
        }
    }
}

impl From<DocumentError> for WriteError {
    fn from(value: DocumentError) -> Self {
        Self::InvalidDocument(value)
    }
}

impl From<StoreError> for WriteError {
    fn from(value: StoreError) -> Self {
        Self::StoreFailure(value)
    }
}

/// Merge-writer over any shared store implementation.
pub struct MergeWriter<S: SharedStore> {
    store: S,
    max_attempts: u32,
}

impl<S: SharedStore> MergeWriter<S> {
    pub fn new(store: S) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_ATTEMPTS)
    }

    /// Creates a writer with a custom attempt budget (at least one).
    pub fn with_max_attempts(store: S, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merges `incoming_json` into the document at `(partition, key)`.
    ///
    /// Returns the document as committed.
    ///
    /// # Errors
    /// - `InvalidDocument` when `incoming_json` is malformed or not an object.
    /// - `StoreFailure` when the partition is unavailable or the write fails.
    /// - `Contended` when every compare-and-swap attempt lost.
    pub fn merge_write(
        &self,
        partition: &str,
        key: &str,
        incoming_json: &str,
    ) -> Result<Document, WriteError> {
        let incoming = match parse_document(incoming_json) {
            Ok(document) => document,
            Err(err) => {
                warn!(
                    "event=merge_write module=service status=rejected key={} bytes={} error_code=invalid_document",
                    key,
                    incoming_json.len()
                );
                return Err(err.into());
            }
        };

        self.merge_document(partition, key, incoming)
    }

    /// Merges an already-parsed document into `(partition, key)`.
    pub fn merge_document(
        &self,
        partition: &str,
        key: &str,
        incoming: Document,
    ) -> Result<Document, WriteError> {
        for attempt in 1..=self.max_attempts {
            let current = self
                .store
                .get_revision(partition, key)
                .map_err(|err| log_store_failure(key, err))?;
            let expected = current.as_ref().map(|stored| stored.revision);
            let base = parse_stored_or_empty(current.as_ref().map(|s| s.value.as_str()), key);

            let merged = merge_documents(base, incoming.clone());
            let serialized = to_stored_string(&merged)
                .map_err(|err| log_store_failure(key, StoreError::Encoding(err.to_string())))?;

            let committed = self
                .store
                .compare_and_set(partition, key, expected, &serialized)
                .map_err(|err| log_store_failure(key, err))?;
            if committed {
                info!(
                    "event=merge_write module=service status=ok key={} keys={} attempt={}",
                    key,
                    merged.len(),
                    attempt
                );
                return Ok(merged);
            }

            debug!(
                "event=merge_write module=service status=retry key={} attempt={}",
                key, attempt
            );
        }

        warn!(
            "event=merge_write module=service status=error key={} error_code=contended attempts={}",
            key, self.max_attempts
        );
        Err(WriteError::Contended {
            attempts: self.max_attempts,
        })
    }

    /// Writes a raw string without merging.
    pub fn write_raw(&self, partition: &str, key: &str, value: &str) -> Result<(), WriteError> {
        self.store
            .set(partition, key, value)
            .map_err(|err| log_store_failure(key, err))?;
        info!(
            "event=raw_write module=service status=ok key={} bytes={}",
            key,
            value.len()
        );
        Ok(())
    }
}

fn log_store_failure(key: &str, err: StoreError) -> WriteError {
    warn!(
        "event=merge_write module=service status=error key={} error_code={} error={}",
        key,
        if err.is_unavailable() {
            "store_unavailable"
        } else {
            "store_failure"
        },
        err
    );
    WriteError::StoreFailure(err)
}
