//! Entry provider for one widget kind.
//!
//! # Responsibility
//! - Build placeholder, snapshot and timeline entries from shared documents.
//! - Apply the kind's field mapping and defaults.
//!
//! # Invariants
//! - `placeholder` never touches the store.
//! - `snapshot` and `timeline` never fail; an unavailable partition yields
//!   an all-defaults entry with `EntryOrigin::Fallback`.
//! - Each store key is read at most once per call.

use crate::config::{FieldSpec, WidgetKindConfig};
use crate::model::document::parse_stored_or_empty;
use crate::model::entry::{Entry, EntryField, EntryOrigin, Timeline};
use crate::store::{SharedStore, StoreError};
use crate::widget::format::derive_field;
use crate::widget::scheduler::RefreshScheduler;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

/// Renderer-side provider bound to one kind and partition.
pub struct EntryProvider<S: SharedStore> {
    store: S,
    partition: String,
    kind: WidgetKindConfig,
    scheduler: RefreshScheduler,
}

impl<S: SharedStore> EntryProvider<S> {
    pub fn new(
        store: S,
        partition: impl Into<String>,
        kind: WidgetKindConfig,
        scheduler: RefreshScheduler,
    ) -> Self {
        Self {
            store,
            partition: partition.into(),
            kind,
            scheduler,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind.kind
    }

    /// Static default entry.
    pub fn placeholder(&self) -> Entry {
        self.placeholder_at(Utc::now())
    }

    pub fn placeholder_at(&self, now: DateTime<Utc>) -> Entry {
        self.defaults_entry(now, EntryOrigin::Placeholder)
    }

    /// Entry built from the current shared documents.
    pub fn snapshot(&self) -> Entry {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Entry {
        match self.read_raw_values() {
            Ok(raw_values) => Entry {
                date: now,
                kind: self.kind.kind.clone(),
                origin: EntryOrigin::Stored,
                fields: self
                    .kind
                    .fields
                    .iter()
                    .map(|spec| EntryField {
                        name: spec.name.clone(),
                        value: derive_field(spec, raw_values.get(&spec.name).map(String::as_str)),
                    })
                    .collect(),
            },
            Err(err) => {
                warn!(
                    "event=widget_snapshot module=widget status=fallback kind={} error_code={} error={}",
                    self.kind.kind,
                    if err.is_unavailable() {
                        "store_unavailable"
                    } else {
                        "store_failure"
                    },
                    err
                );
                self.defaults_entry(now, EntryOrigin::Fallback)
            }
        }
    }

    /// Single-entry timeline paired with the kind's refresh policy.
    pub fn timeline(&self) -> Timeline {
        self.timeline_at(Utc::now())
    }

    pub fn timeline_at(&self, now: DateTime<Utc>) -> Timeline {
        let entry = self.snapshot_at(now);
        let policy = self.scheduler.next_refresh(&self.kind.kind, now);
        debug!(
            "event=widget_timeline module=widget status=ok kind={} refresh_after={}",
            self.kind.kind,
            policy.after.to_rfc3339()
        );
        Timeline::single(entry, policy)
    }

    fn defaults_entry(&self, now: DateTime<Utc>, origin: EntryOrigin) -> Entry {
        Entry {
            date: now,
            kind: self.kind.kind.clone(),
            origin,
            fields: self
                .kind
                .fields
                .iter()
                .map(|spec| EntryField {
                    name: spec.name.clone(),
                    value: spec.default.clone(),
                })
                .collect(),
        }
    }

    /// Reads the raw value of every field, keyed by field name.
    fn read_raw_values(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let mut by_key: BTreeMap<&str, Option<String>> = BTreeMap::new();
        for spec in &self.kind.fields {
            if !by_key.contains_key(spec.key.as_str()) {
                let stored = self.store.get(&self.partition, &spec.key)?;
                by_key.insert(spec.key.as_str(), stored);
            }
        }

        let mut values = BTreeMap::new();
        for spec in &self.kind.fields {
            let stored = by_key.get(spec.key.as_str()).and_then(Option::as_deref);
            if let Some(value) = extract_field(spec, stored) {
                values.insert(spec.name.clone(), value);
            }
        }
        Ok(values)
    }
}

fn extract_field(spec: &FieldSpec, stored: Option<&str>) -> Option<String> {
    let Some(json_field) = spec.json_field.as_deref() else {
        return stored.map(str::to_string);
    };

    let document = parse_stored_or_empty(stored, &spec.key);
    match document.get(json_field) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            debug!(
                "event=widget_field module=widget status=fallback key={} field={} reason=non_string",
                spec.key, json_field
            );
            None
        }
        None => None,
    }
}
