//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose producer calls (`set_shared`, `reload_widget`, push delivery)
//!   and renderer calls (placeholder/snapshot/timeline) to Dart via FRB.
//! - Own the process-wide widget runtime (deployment + shared store).
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - The runtime is configured at most once per process; later calls with
//!   the same configuration are no-ops, different ones are rejected.

use homewidget_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AppGroupStore, ChannelError, Entry, EntryOrigin, HostBridge, PushOutcome, ReloadSignal,
    RenderHost, Timeline, WidgetDeployment,
};
use log::{info, warn};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

const CONFIG_PATH_ENV: &str = "HOMEWIDGET_CONFIG";
const CONTAINER_DIR_ENV: &str = "HOMEWIDGET_CONTAINER_DIR";

static RUNTIME: OnceCell<WidgetRuntime> = OnceCell::new();

struct WidgetRuntime {
    deployment: WidgetDeployment,
    container_dir: PathBuf,
    reload: Arc<ReloadSignal>,
    bridge: HostBridge<Arc<AppGroupStore>>,
    host: RenderHost<Arc<AppGroupStore>>,
}

impl WidgetRuntime {
    fn new(deployment: WidgetDeployment, container_dir: PathBuf) -> Self {
        let store = Arc::new(AppGroupStore::new(container_dir.clone()));
        let reload = Arc::new(ReloadSignal::new());
        let bridge = HostBridge::new(&deployment, Arc::clone(&store), Arc::clone(&reload));
        let host = RenderHost::new(&deployment, store, Arc::clone(&reload));
        Self {
            deployment,
            container_dir,
            reload,
            bridge,
            host,
        }
    }

    fn resolve_kind(&self, kind: Option<String>) -> String {
        kind.map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.deployment.default_kind.clone())
    }
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Configures the widget runtime for this process.
///
/// Input semantics:
/// - `config`: TOML deployment text, or a preset name
///   (`note|signal|tracker`); blank selects `note`.
/// - `container_dir`: shared app-group container directory.
///
/// # FFI contract
/// - Returns empty string on success and error message on failure.
/// - Idempotent for identical input; reconfiguration is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn configure(config: String, container_dir: String) -> String {
    let deployment = match parse_deployment(config.trim()) {
        Ok(deployment) => deployment,
        Err(err) => return err,
    };
    let container_dir = container_dir.trim();
    if container_dir.is_empty() {
        return "container_dir cannot be empty".to_string();
    }
    let container_dir = PathBuf::from(container_dir);

    let runtime =
        RUNTIME.get_or_init(|| WidgetRuntime::new(deployment.clone(), container_dir.clone()));
    if runtime.deployment != deployment || runtime.container_dir != container_dir {
        return format!(
            "widget runtime already configured for partition `{}` at `{}`",
            runtime.deployment.partition,
            runtime.container_dir.display()
        );
    }
    String::new()
}

/// Display-ready field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetFieldDto {
    pub name: String,
    pub value: String,
}

/// Entry envelope for the widget renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetEntryDto {
    pub kind: String,
    /// Entry date in epoch milliseconds.
    pub date_epoch_ms: i64,
    /// `placeholder|stored|fallback`.
    pub origin: String,
    pub fields: Vec<WidgetFieldDto>,
}

/// Timeline envelope for the widget renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetTimelineDto {
    pub kind: String,
    pub entries: Vec<WidgetEntryDto>,
    /// Earliest next regeneration, epoch milliseconds.
    pub refresh_after_epoch_ms: i64,
}

/// Method-channel response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResponse {
    /// Whether the call was accepted (argument and payload validation).
    pub ok: bool,
    /// JSON-encoded result value on success.
    pub result_json: Option<String>,
    /// Stable error code (`bad_args|invalid_document|not_implemented`).
    pub error_code: Option<String>,
    /// Human-readable message for diagnostics.
    pub message: String,
}

impl ChannelResponse {
    fn success(result: &Value) -> Self {
        Self {
            ok: true,
            result_json: Some(result.to_string()),
            error_code: None,
            message: String::new(),
        }
    }

    fn failure(err: &ChannelError) -> Self {
        Self {
            ok: false,
            result_json: None,
            error_code: Some(err.code().to_string()),
            message: err.to_string(),
        }
    }

    fn from_result(result: Result<Value, ChannelError>) -> Self {
        match result {
            Ok(value) => Self::success(&value),
            Err(err) => Self::failure(&err),
        }
    }
}

/// `setShared`: merge-writes `value` (JSON object text) into `key`.
///
/// # FFI contract
/// - Missing arguments fail with `bad_args` before any store access.
/// - `result_json` is `true` when written, `false` when the store was
///   unavailable (no-op).
#[flutter_rust_bridge::frb(sync)]
pub fn set_shared(key: Option<String>, value: Option<String>) -> ChannelResponse {
    let (Some(key), Some(value)) = (key, value) else {
        return ChannelResponse::failure(&ChannelError::BadArgs(
            "`key` and `value` are required".to_string(),
        ));
    };
    ChannelResponse::from_result(
        runtime()
            .bridge
            .set_shared_document(&key, &value)
            .map(Value::Bool),
    )
}

/// `reloadWidget`: requests early regeneration of the default kind.
#[flutter_rust_bridge::frb(sync)]
pub fn reload_widget() -> bool {
    runtime().bridge.reload_widget()
}

/// Stores a raw (non-JSON) string under `key`.
#[flutter_rust_bridge::frb(sync)]
pub fn save_widget_data(key: String, value: String) -> ChannelResponse {
    let arguments = serde_json::json!({ "key": key, "value": value });
    ChannelResponse::from_result(runtime().bridge.save_widget_data(&arguments).map(Value::Bool))
}

/// Dispatches a raw method-channel call with JSON-encoded arguments.
#[flutter_rust_bridge::frb(sync)]
pub fn invoke_method(method: String, arguments_json: String) -> ChannelResponse {
    let arguments = if arguments_json.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str::<Value>(&arguments_json) {
            Ok(value) => value,
            Err(err) => {
                return ChannelResponse::failure(&ChannelError::BadArgs(format!(
                    "arguments are not valid JSON: {err}"
                )))
            }
        }
    };
    ChannelResponse::from_result(runtime().bridge.handle_method_call(&method, &arguments))
}

/// Routes a push payload (JSON object text) into the shared store.
///
/// Returns `new_data|no_data|failed`.
#[flutter_rust_bridge::frb(sync)]
pub fn deliver_push(payload_json: String) -> String {
    let outcome = match serde_json::from_str::<Value>(&payload_json) {
        Ok(payload) => runtime().bridge.deliver_push(&payload),
        Err(err) => {
            warn!(
                "event=push_delivery module=ffi status=ignored bytes={} error={}",
                payload_json.len(),
                err
            );
            PushOutcome::NoData
        }
    };
    push_outcome_label(outcome).to_string()
}

/// Static placeholder entry; `None` for an unknown kind.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_placeholder(kind: Option<String>) -> Option<WidgetEntryDto> {
    let runtime = runtime();
    runtime
        .host
        .placeholder(&runtime.resolve_kind(kind))
        .map(to_entry_dto)
}

/// Snapshot entry from current shared documents; `None` for an unknown kind.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_snapshot(kind: Option<String>) -> Option<WidgetEntryDto> {
    let runtime = runtime();
    runtime
        .host
        .snapshot(&runtime.resolve_kind(kind))
        .map(to_entry_dto)
}

/// Timeline with refresh policy; `None` for an unknown kind.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_timeline(kind: Option<String>) -> Option<WidgetTimelineDto> {
    let runtime = runtime();
    let kind = runtime.resolve_kind(kind);
    runtime
        .host
        .timeline(&kind)
        .map(|timeline| to_timeline_dto(kind, timeline))
}

/// Drains kinds awaiting an early reload, for the native widget center.
#[flutter_rust_bridge::frb(sync)]
pub fn take_pending_reloads() -> Vec<String> {
    runtime().reload.take_pending()
}

fn runtime() -> &'static WidgetRuntime {
    RUNTIME.get_or_init(|| {
        let deployment = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|path| !path.is_empty())
            .and_then(|path| match WidgetDeployment::load_from_file(&path) {
                Ok(deployment) => Some(deployment),
                Err(err) => {
                    warn!(
                        "event=runtime_init module=ffi status=fallback error_code=config_invalid error={}",
                        err
                    );
                    None
                }
            })
            .unwrap_or_else(WidgetDeployment::note_preset);

        let container_dir = std::env::var(CONTAINER_DIR_ENV)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        info!(
            "event=runtime_init module=ffi status=ok partition={} kinds={}",
            deployment.partition,
            deployment.kinds.len()
        );
        WidgetRuntime::new(deployment, container_dir)
    })
}

fn parse_deployment(config: &str) -> Result<WidgetDeployment, String> {
    if config.is_empty() {
        return Ok(WidgetDeployment::note_preset());
    }
    if !config.contains('=') {
        return WidgetDeployment::preset(config).map_err(|err| err.to_string());
    }
    WidgetDeployment::from_toml_str(config).map_err(|err| err.to_string())
}

fn to_entry_dto(entry: Entry) -> WidgetEntryDto {
    WidgetEntryDto {
        kind: entry.kind,
        date_epoch_ms: entry.date.timestamp_millis(),
        origin: origin_label(entry.origin).to_string(),
        fields: entry
            .fields
            .into_iter()
            .map(|field| WidgetFieldDto {
                name: field.name,
                value: field.value,
            })
            .collect(),
    }
}

fn to_timeline_dto(kind: String, timeline: Timeline) -> WidgetTimelineDto {
    let (entries, policy) = timeline.into_parts();
    WidgetTimelineDto {
        kind,
        entries: entries.into_iter().map(to_entry_dto).collect(),
        refresh_after_epoch_ms: policy.after.timestamp_millis(),
    }
}

fn origin_label(origin: EntryOrigin) -> &'static str {
    match origin {
        EntryOrigin::Placeholder => "placeholder",
        EntryOrigin::Stored => "stored",
        EntryOrigin::Fallback => "fallback",
    }
}

fn push_outcome_label(outcome: PushOutcome) -> &'static str {
    match outcome {
        PushOutcome::NewData => "new_data",
        PushOutcome::NoData => "no_data",
        PushOutcome::Failed => "failed",
    }
}
