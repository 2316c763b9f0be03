//! Render inputs handed to the widget host.
//!
//! # Responsibility
//! - Carry one point-in-time view (`Entry`) derived from shared documents.
//! - Pair entries with the earliest next regeneration time (`Timeline`).
//!
//! # Invariants
//! - `Timeline` is never empty.
//! - Entries keep field order as declared by the widget kind.

use chrono::{DateTime, Utc};

/// Where the values of an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Static placeholder; the store was not consulted.
    Placeholder,
    /// Derived from the shared store (missing fields use defaults).
    Stored,
    /// The partition could not be opened; every field is a default.
    Fallback,
}

/// One named, display-ready value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryField {
    pub name: String,
    pub value: String,
}

/// Point-in-time rendering input for one widget kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub date: DateTime<Utc>,
    pub kind: String,
    pub origin: EntryOrigin,
    pub fields: Vec<EntryField>,
}

impl Entry {
    /// Returns the display value of `name`, if the kind declares it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// "Refresh no earlier than" policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshPolicy {
    pub after: DateTime<Utc>,
}

/// Non-empty ordered entries plus one refresh policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    entries: Vec<Entry>,
    policy: RefreshPolicy,
}

impl Timeline {
    /// Builds a single-entry timeline.
    pub fn single(entry: Entry, policy: RefreshPolicy) -> Self {
        Self {
            entries: vec![entry],
            policy,
        }
    }

    /// Builds a timeline from a first entry and later-dated ones.
    ///
    /// Entries are sorted by date; the first argument guarantees non-emptiness.
    pub fn new(first: Entry, rest: Vec<Entry>, policy: RefreshPolicy) -> Self {
        let mut entries = Vec::with_capacity(rest.len() + 1);
        entries.push(first);
        entries.extend(rest);
        entries.sort_by_key(|entry| entry.date);
        Self { entries, policy }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Earliest entry; always present.
    pub fn first(&self) -> &Entry {
        &self.entries[0]
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn into_parts(self) -> (Vec<Entry>, RefreshPolicy) {
        (self.entries, self.policy)
    }
}
