//! Lenient readers for ESI response bodies.
//!
//! Anything missing or of the wrong shape reads as empty.

use serde_json::Value;

use roster_sync::AffiliationFacts;

/// Reads `corporation_id` and `alliance_id` from a character document.
pub(crate) fn affiliation(body: &Value) -> AffiliationFacts {
    AffiliationFacts {
        corporation_id: id_field(body, "corporation_id"),
        alliance_id: id_field(body, "alliance_id"),
    }
}

/// Reads the `roles` string array from a roles document.
pub(crate) fn roles(body: &Value) -> Vec<String> {
    body.get("roles")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Reads the `name` of every entry of a titles array.
pub(crate) fn titles(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn id_field(body: &Value, field: &str) -> Option<String> {
    match body.get(field)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
