//! Field derivation rules.

use crate::config::{FieldFormat, FieldSpec, PLACEHOLDER_DASH};
use chrono::{DateTime, Utc};

/// Longest unparseable timestamp shown untruncated, in characters.
pub const MAX_RAW_TIMESTAMP_CHARS: usize = 24;
const ELLIPSIS: char = '…';
const TIMESTAMP_DISPLAY_FORMAT: &str = "%b %-d, %H:%M";

/// Turns a raw field value into display text according to `spec`.
pub fn derive_field(spec: &FieldSpec, raw: Option<&str>) -> String {
    match raw {
        Some(value) if !value.trim().is_empty() => match spec.format {
            FieldFormat::Text => value.to_string(),
            FieldFormat::Timestamp => format_timestamp(value),
        },
        _ => spec.default.clone(),
    }
}

/// Formats an ISO-8601 timestamp as `MMM d, HH:mm` (UTC).
///
/// The `—` sentinel is returned unchanged. Unparseable input is shown raw,
/// truncated to `MAX_RAW_TIMESTAMP_CHARS` plus an ellipsis.
pub fn format_timestamp(raw: &str) -> String {
    if raw == PLACEHOLDER_DASH {
        return raw.to_string();
    }

    match parse_internet_date_time(raw) {
        Some(parsed) => parsed.format(TIMESTAMP_DISPLAY_FORMAT).to_string(),
        None => truncate_with_ellipsis(raw, MAX_RAW_TIMESTAMP_CHARS),
    }
}

/// Strict internet date-time: `YYYY-MM-DDTHH:MM:SS[.fff](Z|±HH:MM)`.
///
/// Uppercase `T` and `Z` only; no surrounding whitespace.
fn parse_internet_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let strict_shape = raw.as_bytes().get(10) == Some(&b'T')
        && raw
            .bytes()
            .all(|byte| byte.is_ascii_digit() || b"-:.+TZ".contains(&byte));
    if !strict_shape {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn truncate_with_ellipsis(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push(ELLIPSIS);
    truncated
}
