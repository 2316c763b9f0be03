//! Deployment configuration for widget kinds.
//!
//! # Responsibility
//! - Describe one producer/renderer deployment: partition, widget kinds,
//!   per-kind refresh delay and field mapping, push routing.
//! - Load deployments from TOML and validate them before use.
//! - Ship presets for the observed deployments (`note`, `signal`,
//!   `tracker`).
//!
//! # Invariants
//! - A validated deployment has at least one kind, unique kind ids and a
//!   `default_kind` that exists.
//! - Every kind refreshes no more often than once per second and declares
//!   at least one field with a unique name.

use crate::store::is_valid_partition_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Sentinel raw value that is displayed as-is without formatting.
pub const PLACEHOLDER_DASH: &str = "—";

/// How a raw field value is turned into display text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    /// Verbatim text; blank values fall back to the default.
    #[default]
    Text,
    /// ISO-8601 timestamp rendered as `MMM d, HH:mm`.
    Timestamp,
}

/// One display field of a widget kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name exposed on the entry.
    pub name: String,
    /// Store key holding the value.
    pub key: String,
    /// When set, the stored value is a JSON document and this top-level
    /// field is read; otherwise the raw stored string is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_field: Option<String>,
    #[serde(default)]
    pub format: FieldFormat,
    /// Value used when the field is missing, blank or unreadable.
    pub default: String,
}

impl FieldSpec {
    pub fn raw(name: &str, key: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            json_field: None,
            format: FieldFormat::Text,
            default: default.to_string(),
        }
    }

    pub fn json(name: &str, key: &str, json_field: &str, default: &str) -> Self {
        Self {
            json_field: Some(json_field.to_string()),
            ..Self::raw(name, key, default)
        }
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }
}

/// Rendering contract for one widget kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetKindConfig {
    /// Host-visible widget kind id.
    pub kind: String,
    /// Minimum delay between timeline regenerations, in seconds.
    pub min_refresh_secs: u64,
    pub fields: Vec<FieldSpec>,
}

/// Where push payloads are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Store key receiving the merged payload.
    pub key: String,
    /// Payload field carrying the text.
    #[serde(default = "default_push_field")]
    pub field: String,
}

fn default_push_field() -> String {
    "note".to_string()
}

/// One producer/renderer pair sharing a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetDeployment {
    /// App-group style partition id.
    pub partition: String,
    /// Kind reloaded by `reloadWidget` and after shared writes.
    pub default_kind: String,
    pub push: PushConfig,
    pub kinds: Vec<WidgetKindConfig>,
}

/// Configuration load/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
    UnknownPreset(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read widget config: {err}"),
            Self::Parse(details) => write!(f, "failed to parse widget config: {details}"),
            Self::Invalid(details) => write!(f, "invalid widget config: {details}"),
            Self::UnknownPreset(name) => {
                write!(f, "unknown preset `{name}`; expected note|signal|tracker")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl WidgetDeployment {
    /// Parses and validates a TOML deployment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let deployment: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        deployment.validate()?;
        Ok(deployment)
    }

    /// Reads, parses and validates a TOML deployment file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serializes the deployment back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns one of the built-in presets by name.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "note" => Ok(Self::note_preset()),
            "signal" => Ok(Self::signal_preset()),
            "tracker" => Ok(Self::tracker_preset()),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// Free-text note read from a JSON document, refreshed every minute.
    pub fn note_preset() -> Self {
        Self {
            partition: "group.com.efeapps.hydrodaily".to_string(),
            default_kind: "MyHomeWidget".to_string(),
            push: PushConfig {
                key: "text_from_flutter_app".to_string(),
                field: default_push_field(),
            },
            kinds: vec![WidgetKindConfig {
                kind: "MyHomeWidget".to_string(),
                min_refresh_secs: 60,
                fields: vec![FieldSpec::json(
                    "note",
                    "text_from_flutter_app",
                    "note",
                    "Write a note ✨",
                )],
            }],
        }
    }

    /// Single raw signal string, refreshed every 15 minutes.
    pub fn signal_preset() -> Self {
        Self {
            partition: "group.tunahanoguz.pizzatracker".to_string(),
            default_kind: "MyHomeWidgetExtension".to_string(),
            push: PushConfig {
                key: "text_from_flutter_app".to_string(),
                field: default_push_field(),
            },
            kinds: vec![WidgetKindConfig {
                kind: "MyHomeWidgetExtension".to_string(),
                min_refresh_secs: 15 * 60,
                fields: vec![FieldSpec::raw(
                    "text",
                    "text_from_flutter_app",
                    "Nothing Ever Happens: --%",
                )],
            }],
        }
    }

    /// Title/value/subtitle/updated-at tracker, refreshed every 30 minutes.
    pub fn tracker_preset() -> Self {
        Self {
            partition: "group.com.efe.lifenotes".to_string(),
            default_kind: "MyHomeWidget".to_string(),
            push: PushConfig {
                key: "widget_push".to_string(),
                field: default_push_field(),
            },
            kinds: vec![WidgetKindConfig {
                kind: "MyHomeWidget".to_string(),
                min_refresh_secs: 30 * 60,
                fields: vec![
                    FieldSpec::raw("title", "widget_title", "Pizza Tracker"),
                    FieldSpec::raw("value", "widget_value", PLACEHOLDER_DASH),
                    FieldSpec::raw("subtitle", "widget_subtitle", "Signal"),
                    FieldSpec::raw("updatedAt", "widget_updated_at", PLACEHOLDER_DASH)
                        .with_format(FieldFormat::Timestamp),
                ],
            }],
        }
    }

    /// Looks up a kind by id.
    pub fn kind(&self, kind: &str) -> Option<&WidgetKindConfig> {
        self.kinds.iter().find(|config| config.kind == kind)
    }

    /// Checks the invariants listed in the module docs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_partition_id(&self.partition) {
            return Err(ConfigError::Invalid(format!(
                "partition `{}` is not a valid identifier",
                self.partition
            )));
        }
        if self.kinds.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one widget kind is required".to_string(),
            ));
        }
        if self.push.key.trim().is_empty() || self.push.field.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "push key and field must not be empty".to_string(),
            ));
        }

        let mut seen_kinds = BTreeSet::new();
        for kind in &self.kinds {
            validate_kind(kind)?;
            if !seen_kinds.insert(kind.kind.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate widget kind `{}`",
                    kind.kind
                )));
            }
        }

        if !seen_kinds.contains(self.default_kind.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "default_kind `{}` is not declared in kinds",
                self.default_kind
            )));
        }

        Ok(())
    }
}

fn validate_kind(kind: &WidgetKindConfig) -> Result<(), ConfigError> {
    if kind.kind.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "widget kind id must not be empty".to_string(),
        ));
    }
    if kind.min_refresh_secs == 0 {
        return Err(ConfigError::Invalid(format!(
            "kind `{}` must refresh at most once per second",
            kind.kind
        )));
    }
    if kind.fields.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "kind `{}` declares no fields",
            kind.kind
        )));
    }

    let mut names = BTreeSet::new();
    for field in &kind.fields {
        if field.name.trim().is_empty() || field.key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "kind `{}` has a field with an empty name or key",
                kind.kind
            )));
        }
        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "kind `{}` declares field `{}` twice",
                kind.kind, field.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, FieldFormat, WidgetDeployment};

    const NOTE_TOML: &str = r#"
partition = "group.example.notes"
default_kind = "NoteWidget"

[push]
key = "shared_note"

[[kinds]]
kind = "NoteWidget"
min_refresh_secs = 60

[[kinds.fields]]
name = "note"
key = "shared_note"
json_field = "note"
default = "Write a note"

[[kinds.fields]]
name = "updatedAt"
key = "shared_note"
json_field = "updatedAt"
format = "timestamp"
default = "—"
"#;

    #[test]
    fn parses_toml_deployment() {
        let deployment = WidgetDeployment::from_toml_str(NOTE_TOML).expect("valid config");
        assert_eq!(deployment.partition, "group.example.notes");
        assert_eq!(deployment.push.field, "note");
        let kind = deployment.kind("NoteWidget").expect("kind present");
        assert_eq!(kind.min_refresh_secs, 60);
        assert_eq!(kind.fields[0].format, FieldFormat::Text);
        assert_eq!(kind.fields[1].format, FieldFormat::Timestamp);
    }

    #[test]
    fn presets_are_valid() {
        for name in ["note", "signal", "tracker"] {
            let deployment = WidgetDeployment::preset(name).expect("known preset");
            deployment.validate().expect("preset should validate");
        }
        assert!(matches!(
            WidgetDeployment::preset("weather"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn presets_survive_toml_serialization() {
        let preset = WidgetDeployment::tracker_preset();
        let text = preset.to_toml_string().expect("serialize preset");
        let parsed = WidgetDeployment::from_toml_str(&text).expect("reparse preset");
        assert_eq!(parsed, preset);
    }

    #[test]
    fn rejects_missing_default_kind() {
        let mut deployment = WidgetDeployment::note_preset();
        deployment.default_kind = "Other".to_string();
        let err = deployment.validate().expect_err("default kind must exist");
        assert!(err.to_string().contains("default_kind"));
    }

    #[test]
    fn rejects_zero_refresh_delay_and_duplicate_fields() {
        let mut deployment = WidgetDeployment::note_preset();
        deployment.kinds[0].min_refresh_secs = 0;
        assert!(deployment.validate().is_err());

        let mut deployment = WidgetDeployment::tracker_preset();
        let duplicate = deployment.kinds[0].fields[0].clone();
        deployment.kinds[0].fields.push(duplicate);
        let err = deployment.validate().expect_err("duplicate field must fail");
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn rejects_invalid_partition() {
        let mut deployment = WidgetDeployment::signal_preset();
        deployment.partition = "group/../x".to_string();
        assert!(matches!(
            deployment.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }
}
