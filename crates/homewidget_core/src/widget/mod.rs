//! Renderer-side widget pipeline.
//!
//! # Responsibility
//! - Derive display fields from shared documents (`format`).
//! - Produce placeholder/snapshot/timeline entries per kind (`provider`).
//! - Compute refresh policies (`scheduler`) and coalesce reload requests
//!   (`reload`, `host`).
//!
//! # Invariants
//! - Provider calls never fail; storage problems degrade to defaults.
//! - Provider calls never leave background work running after they return.

pub mod format;
pub mod host;
pub mod provider;
pub mod reload;
pub mod scheduler;
