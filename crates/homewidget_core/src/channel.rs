//! Producer-facing host channel.
//!
//! # Responsibility
//! - Validate method-channel calls from the foreground app and route them
//!   to the merge writer and reload signal.
//! - Route push payloads into the configured push key.
//!
//! # Invariants
//! - Missing or non-string arguments fail with `BadArgs` before any write.
//! - A reload is signaled only after a committed write (or on request).
//! - Storage failures are reported as `false`, never as a host error.

use crate::config::{PushConfig, WidgetDeployment};
use crate::model::document::{Document, DocumentError};
use crate::service::merge_writer::{MergeWriter, WriteError};
use crate::store::SharedStore;
use crate::widget::reload::ReloadSignal;
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const METHOD_SET_SHARED: &str = "setShared";
pub const METHOD_RELOAD_WIDGET: &str = "reloadWidget";
pub const METHOD_SAVE_WIDGET_DATA: &str = "saveWidgetData";

/// Errors surfaced synchronously to the calling app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Arguments missing or of the wrong type; nothing was written.
    BadArgs(String),
    /// Payload is not a JSON object; the prior value is retained.
    InvalidDocument(DocumentError),
    /// Unknown method name.
    NotImplemented(String),
}

impl ChannelError {
    /// Stable error code for host-side error objects.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadArgs(_) => "bad_args",
            Self::InvalidDocument(_) => "invalid_document",
            Self::NotImplemented(_) => "not_implemented",
        }
    }
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadArgs(details) => write!(f, "invalid arguments: {details}"),
            Self::InvalidDocument(err) => write!(f, "{err}"),
            Self::NotImplemented(method) => write!(f, "method not implemented: {method}"),
        }
    }
}

impl Error for ChannelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDocument(err) => Some(err),
            _ => None,
        }
    }
}

/// Result of handling one push delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Payload was stored and a reload signaled.
    NewData,
    /// Payload carried nothing for the widget.
    NoData,
    /// Payload was relevant but could not be stored.
    Failed,
}

/// Producer-side entry point shared by the method channel and push handler.
pub struct HostBridge<S: SharedStore> {
    writer: MergeWriter<S>,
    reload: Arc<ReloadSignal>,
    partition: String,
    default_kind: String,
    push: PushConfig,
}

impl<S: SharedStore> HostBridge<S> {
    pub fn new(deployment: &WidgetDeployment, store: S, reload: Arc<ReloadSignal>) -> Self {
        Self {
            writer: MergeWriter::new(store),
            reload,
            partition: deployment.partition.clone(),
            default_kind: deployment.default_kind.clone(),
            push: deployment.push.clone(),
        }
    }

    pub fn writer(&self) -> &MergeWriter<S> {
        &self.writer
    }

    /// Dispatches one method-channel call.
    pub fn handle_method_call(&self, method: &str, arguments: &Value) -> Result<Value, ChannelError> {
        match method {
            METHOD_SET_SHARED => self.set_shared(arguments).map(Value::Bool),
            METHOD_RELOAD_WIDGET => Ok(Value::Bool(self.reload_widget())),
            METHOD_SAVE_WIDGET_DATA => self.save_widget_data(arguments).map(Value::Bool),
            other => Err(ChannelError::NotImplemented(other.to_string())),
        }
    }

    /// `setShared({key, value})`: merge-writes `value` into `key`.
    pub fn set_shared(&self, arguments: &Value) -> Result<bool, ChannelError> {
        let (key, value) = key_value_args(arguments)?;
        self.set_shared_document(key, value)
    }

    /// Merge-writes `value` (JSON object text) into `key`.
    ///
    /// Returns `Ok(false)` when the store could not take the write.
    pub fn set_shared_document(&self, key: &str, value: &str) -> Result<bool, ChannelError> {
        match self.writer.merge_write(&self.partition, key, value) {
            Ok(_) => {
                self.reload.signal(&self.default_kind);
                Ok(true)
            }
            Err(WriteError::InvalidDocument(err)) => Err(ChannelError::InvalidDocument(err)),
            Err(err) => {
                warn!(
                    "event=set_shared module=channel status=noop key={} error={}",
                    key, err
                );
                Ok(false)
            }
        }
    }

    /// `saveWidgetData({key, value})`: stores a raw string and signals the
    /// default kind once the write commits.
    pub fn save_widget_data(&self, arguments: &Value) -> Result<bool, ChannelError> {
        let (key, value) = key_value_args(arguments)?;
        match self.writer.write_raw(&self.partition, key, value) {
            Ok(()) => {
                self.reload.signal(&self.default_kind);
                Ok(true)
            }
            Err(err) => {
                warn!(
                    "event=save_widget_data module=channel status=noop key={} error={}",
                    key, err
                );
                Ok(false)
            }
        }
    }

    /// `reloadWidget()`: signals the default kind.
    pub fn reload_widget(&self) -> bool {
        self.reload.signal(&self.default_kind);
        true
    }

    /// Stores the push field of `payload` as `{field: value}`.
    pub fn deliver_push(&self, payload: &Value) -> PushOutcome {
        let Some(text) = payload.get(&self.push.field).and_then(Value::as_str) else {
            info!(
                "event=push_delivery module=channel status=ignored field={}",
                self.push.field
            );
            return PushOutcome::NoData;
        };

        let mut document = Document::new();
        document.insert(self.push.field.clone(), Value::String(text.to_string()));

        match self
            .writer
            .merge_document(&self.partition, &self.push.key, document)
        {
            Ok(_) => {
                self.reload.signal(&self.default_kind);
                info!(
                    "event=push_delivery module=channel status=ok key={} bytes={}",
                    self.push.key,
                    text.len()
                );
                PushOutcome::NewData
            }
            Err(err) => {
                warn!(
                    "event=push_delivery module=channel status=error key={} error={}",
                    self.push.key, err
                );
                PushOutcome::Failed
            }
        }
    }
}

fn key_value_args(arguments: &Value) -> Result<(&str, &str), ChannelError> {
    let Some(map) = arguments.as_object() else {
        return Err(ChannelError::BadArgs(
            "arguments must be an object".to_string(),
        ));
    };
    let key = string_arg(map, "key")?;
    let value = string_arg(map, "value")?;
    Ok((key, value))
}

fn string_arg<'a>(map: &'a Document, name: &str) -> Result<&'a str, ChannelError> {
    match map.get(name) {
        Some(Value::String(value)) => Ok(value.as_str()),
        Some(_) => Err(ChannelError::BadArgs(format!("`{name}` must be a string"))),
        None => Err(ChannelError::BadArgs(format!("`{name}` is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelError, HostBridge, PushOutcome};
    use crate::config::WidgetDeployment;
    use crate::store::{MemoryStore, SharedStore};
    use crate::widget::reload::ReloadSignal;
    use serde_json::json;
    use std::sync::Arc;

    fn bridge() -> (HostBridge<Arc<MemoryStore>>, Arc<MemoryStore>, Arc<ReloadSignal>) {
        let store = Arc::new(MemoryStore::new());
        let reload = Arc::new(ReloadSignal::new());
        let bridge = HostBridge::new(
            &WidgetDeployment::note_preset(),
            Arc::clone(&store),
            Arc::clone(&reload),
        );
        (bridge, store, reload)
    }

    #[test]
    fn set_shared_rejects_missing_or_non_string_arguments() {
        let (bridge, store, reload) = bridge();
        for arguments in [
            json!(null),
            json!({"key": "note"}),
            json!({"value": "{}"}),
            json!({"key": 1, "value": "{}"}),
            json!({"key": "note", "value": {"note": "hi"}}),
        ] {
            let err = bridge
                .set_shared(&arguments)
                .expect_err("bad arguments must fail");
            assert_eq!(err.code(), "bad_args");
        }
        assert!(store.is_empty());
        assert!(reload.take_pending().is_empty());
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let (bridge, _, _) = bridge();
        let err = bridge
            .handle_method_call("deleteShared", &json!({}))
            .expect_err("unknown method");
        assert_eq!(err, ChannelError::NotImplemented("deleteShared".to_string()));
    }

    #[test]
    fn save_widget_data_writes_raw_strings() {
        let (bridge, store, reload) = bridge();
        let ok = bridge
            .handle_method_call(
                "saveWidgetData",
                &json!({"key": "widget_value", "value": "42%"}),
            )
            .unwrap();
        assert_eq!(ok, json!(true));
        assert_eq!(
            store
                .get("group.com.efeapps.hydrodaily", "widget_value")
                .unwrap()
                .as_deref(),
            Some("42%")
        );
        assert_eq!(reload.take_pending(), vec!["MyHomeWidget".to_string()]);
    }

    #[test]
    fn failed_raw_write_signals_nothing() {
        let reload = Arc::new(ReloadSignal::new());
        let bridge = HostBridge::new(
            &WidgetDeployment::tracker_preset(),
            Arc::new(MemoryStore::with_partitions(["group.elsewhere"])),
            Arc::clone(&reload),
        );
        let saved = bridge
            .save_widget_data(&json!({"key": "widget_value", "value": "42%"}))
            .unwrap();
        assert!(!saved);
        assert!(reload.take_pending().is_empty());
    }

    #[test]
    fn push_without_note_is_ignored() {
        let (bridge, store, reload) = bridge();
        assert_eq!(bridge.deliver_push(&json!({"aps": {}})), PushOutcome::NoData);
        assert_eq!(bridge.deliver_push(&json!({"note": 5})), PushOutcome::NoData);
        assert!(store.is_empty());
        assert!(reload.take_pending().is_empty());
    }

    #[test]
    fn push_text_is_json_encoded() {
        let (bridge, store, _) = bridge();
        let outcome = bridge.deliver_push(&json!({"note": "say \"hi\""}));
        assert_eq!(outcome, PushOutcome::NewData);
        let stored = store
            .get("group.com.efeapps.hydrodaily", "text_from_flutter_app")
            .unwrap()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(parsed, json!({"note": "say \"hi\""}));
    }

    #[test]
    fn unavailable_store_makes_set_shared_a_noop() {
        let store = Arc::new(MemoryStore::with_partitions(["group.elsewhere"]));
        let reload = Arc::new(ReloadSignal::new());
        let bridge = HostBridge::new(
            &WidgetDeployment::note_preset(),
            Arc::clone(&store),
            Arc::clone(&reload),
        );
        let written = bridge
            .set_shared(&json!({"key": "note", "value": "{\"note\":\"hi\"}"}))
            .expect("storage failures are not channel errors");
        assert!(!written);
        assert!(reload.take_pending().is_empty());
        assert_eq!(
            bridge.deliver_push(&json!({"note": "x"})),
            PushOutcome::Failed
        );
    }
}
