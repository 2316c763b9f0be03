//! Shared-document and widget entry models.
//!
//! # Responsibility
//! - Define the JSON document shape persisted per store key.
//! - Define render inputs (`Entry`, `Timeline`, `RefreshPolicy`).
//!
//! # Invariants
//! - A document is always a JSON object; top-level keys are unique.
//! - A timeline always holds at least one entry.

pub mod document;
pub mod entry;
