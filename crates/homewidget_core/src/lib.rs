//! Core shared-document logic for home-screen widgets.
//! This crate is the single source of truth for the producer/renderer
//! contract: merge-writes into the shared store, entry derivation and
//! refresh scheduling.

pub mod channel;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod widget;

pub use channel::{ChannelError, HostBridge, PushOutcome};
pub use config::{
    ConfigError, FieldFormat, FieldSpec, PushConfig, WidgetDeployment, WidgetKindConfig,
};
pub use logging::{init_logging, logging_status, LogLevel, LogSettings, LoggingError};
pub use model::document::{merge_documents, parse_document, Document, DocumentError};
pub use model::entry::{Entry, EntryField, EntryOrigin, RefreshPolicy, Timeline};
pub use service::merge_writer::{MergeWriter, WriteError};
pub use store::{AppGroupStore, MemoryStore, SharedStore, StoreError, StoreResult, StoredValue};
pub use widget::host::RenderHost;
pub use widget::provider::EntryProvider;
pub use widget::reload::{ReloadSignal, ReloadSink};
pub use widget::scheduler::RefreshScheduler;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
