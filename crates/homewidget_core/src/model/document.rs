//! JSON document parsing and shallow merge.
//!
//! # Responsibility
//! - Parse producer payloads into `Document` (a top-level JSON object).
//! - Recover stored values that no longer parse as an empty document.
//! - Merge a partial document into a base document, top-level only.
//!
//! # Invariants
//! - `merge_documents` never removes a key present only in the base.
//! - Incoming keys always overwrite base keys; nested objects are replaced,
//!   not recursed into.

use log::warn;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// A JSON object keyed by string.
pub type Document = Map<String, Value>;

/// JSON value shape, used to describe rejected payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
}

impl JsonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
        }
    }
}

/// Rejection reasons for an incoming document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Text is not valid JSON.
    Malformed(String),
    /// Valid JSON whose top level is not an object.
    NotAnObject(JsonKind),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(details) => write!(f, "document is not valid JSON: {details}"),
            Self::NotAnObject(kind) => {
                write!(f, "document must be a JSON object, got {}", kind.as_str())
            }
        }
    }
}

impl Error for DocumentError {}

/// Parses text as a top-level JSON object.
///
/// # Errors
/// - `Malformed` when the text is not JSON at all.
/// - `NotAnObject` for arrays and scalars.
pub fn parse_document(text: &str) -> Result<Document, DocumentError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| DocumentError::Malformed(err.to_string()))?;
    into_document(value)
}

/// Converts an already-parsed value into a document.
pub fn into_document(value: Value) -> Result<Document, DocumentError> {
    let kind = match value {
        Value::Object(map) => return Ok(map),
        Value::Null => JsonKind::Null,
        Value::Bool(_) => JsonKind::Bool,
        Value::Number(_) => JsonKind::Number,
        Value::String(_) => JsonKind::String,
        Value::Array(_) => JsonKind::Array,
    };
    Err(DocumentError::NotAnObject(kind))
}

/// Parses a stored value, treating absence and corruption as `{}`.
///
/// Corruption is logged but never surfaced; the next merge-write replaces
/// the unreadable value.
pub fn parse_stored_or_empty(stored: Option<&str>, key: &str) -> Document {
    let Some(text) = stored else {
        return Document::new();
    };

    match parse_document(text) {
        Ok(document) => document,
        Err(err) => {
            warn!(
                "event=stored_document_unreadable module=document status=fallback key={} bytes={} reason={}",
                key,
                text.len(),
                err
            );
            Document::new()
        }
    }
}

/// Shallow-merges `incoming` into `base`.
pub fn merge_documents(mut base: Document, incoming: Document) -> Document {
    for (key, value) in incoming {
        base.insert(key, value);
    }
    base
}

/// Serializes a document to its persisted string form.
pub fn to_stored_string(document: &Document) -> serde_json::Result<String> {
    serde_json::to_string(document)
}

#[cfg(test)]
mod tests {
    use super::{
        merge_documents, parse_document, parse_stored_or_empty, Document, DocumentError, JsonKind,
    };
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().expect("fixture must be an object")
    }

    #[test]
    fn merge_with_empty_incoming_is_identity() {
        let base = doc(json!({"a": "1", "b": {"c": 2}}));
        assert_eq!(merge_documents(base.clone(), Document::new()), base);
    }

    #[test]
    fn merge_into_empty_base_yields_incoming() {
        let incoming = doc(json!({"note": "hi", "n": [1, 2]}));
        assert_eq!(merge_documents(Document::new(), incoming.clone()), incoming);
    }

    #[test]
    fn merge_keeps_key_union_and_prefers_incoming() {
        let base = doc(json!({"a": "1", "keep": true}));
        let incoming = doc(json!({"a": "2", "new": null}));
        let merged = merge_documents(base, incoming);
        assert_eq!(merged, doc(json!({"a": "2", "keep": true, "new": null})));
    }

    #[test]
    fn merge_is_not_commutative_on_conflicting_keys() {
        let left = doc(json!({"a": "1"}));
        let right = doc(json!({"a": "2"}));
        assert_ne!(
            merge_documents(left.clone(), right.clone()),
            merge_documents(right, left)
        );
    }

    #[test]
    fn merge_replaces_nested_objects_without_recursing() {
        let base = doc(json!({"style": {"color": "red", "size": 3}}));
        let incoming = doc(json!({"style": {"color": "blue"}}));
        let merged = merge_documents(base, incoming);
        assert_eq!(merged, doc(json!({"style": {"color": "blue"}})));
    }

    #[test]
    fn parse_rejects_arrays_scalars_and_garbage() {
        assert_eq!(
            parse_document("[1,2,3]"),
            Err(DocumentError::NotAnObject(JsonKind::Array))
        );
        assert_eq!(
            parse_document("\"text\""),
            Err(DocumentError::NotAnObject(JsonKind::String))
        );
        assert_eq!(
            parse_document("42"),
            Err(DocumentError::NotAnObject(JsonKind::Number))
        );
        assert!(matches!(
            parse_document("not-json"),
            Err(DocumentError::Malformed(_))
        ));
    }

    #[test]
    fn duplicate_keys_collapse_to_last_value() {
        let parsed = parse_document(r#"{"a":"1","a":"2"}"#).expect("valid object");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["a"], json!("2"));
    }

    #[test]
    fn stored_corruption_and_absence_recover_as_empty() {
        assert!(parse_stored_or_empty(None, "k").is_empty());
        assert!(parse_stored_or_empty(Some("{broken"), "k").is_empty());
        assert!(parse_stored_or_empty(Some("[1]"), "k").is_empty());
        assert_eq!(
            parse_stored_or_empty(Some(r#"{"a":"1"}"#), "k"),
            doc(json!({"a": "1"}))
        );
    }
}
