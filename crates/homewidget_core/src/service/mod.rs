//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into producer-facing write APIs.
//! - Keep host/FFI layers decoupled from storage details.

pub mod merge_writer;
