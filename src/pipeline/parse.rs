//! Response parsing: model text → [`RawItem`] records.
//!
//! Accepted shapes, after stripping an optional Markdown code fence:
//!
//! * `{"sku_data": [ ... ]}`, as requested by the prompt
//! * a bare `[ ... ]` array
//!
//! Leading or trailing prose around the JSON is tolerated. Array entries that
//! are not JSON objects are dropped with a warning; field-level problems are
//! left for [`crate::normalize`].

use crate::error::QuoteError;
use crate::item::RawItem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Key of the record array in the requested response object.
pub const SKU_DATA_KEY: &str = "sku_data";

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Parse the model's answer for `document` into raw records.
///
/// # Errors
/// [`QuoteError::MalformedResponse`] when no JSON value of an accepted shape
/// can be found.
pub fn parse_response(document: &str, content: &str) -> Result<Vec<RawItem>, QuoteError> {
    let malformed = |detail: String| QuoteError::MalformedResponse {
        document: document.to_string(),
        detail,
    };

    let body = strip_fences(content);
    if body.is_empty() {
        return Err(malformed("empty response".into()));
    }

    let value = serde_json::from_str::<Value>(body)
        .or_else(|first_err| {
            embedded_json(body)
                .and_then(|s| serde_json::from_str::<Value>(s).ok())
                .ok_or(first_err)
        })
        .map_err(|e| malformed(format!("not JSON: {e}")))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove(SKU_DATA_KEY) {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => {
                warn!(document, "Response has no '{}' records", SKU_DATA_KEY);
                Vec::new()
            }
            Some(other) => {
                return Err(malformed(format!(
                    "'{SKU_DATA_KEY}' is {}, expected an array",
                    json_kind(&other)
                )))
            }
        },
        other => {
            return Err(malformed(format!(
                "expected an object or array, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = entries.len();
    let items: Vec<RawItem> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            if !entry.is_object() {
                warn!(document, index = idx, "Dropping non-object record: {}", entry);
                return None;
            }
            match serde_json::from_value::<RawItem>(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(document, index = idx, "Dropping unreadable record: {}", e);
                    None
                }
            }
        })
        .collect();

    debug!(document, "Parsed {} of {} records", items.len(), total);
    Ok(items)
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim().trim_start_matches('\u{feff}');
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// The span from the first `{` or `[` to the last matching closer.
fn embedded_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
