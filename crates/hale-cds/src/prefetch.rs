//! Helpers for FHIR-shaped dynamic documents
//!
//! Context and prefetch bags arrive as arbitrarily shaped JSON. These
//! helpers navigate them without committing to a resource model: path
//! addressing, bundle flattening, and CodeableConcept extraction.

use serde_json::Value;

/// Navigate a dot-separated path; numeric steps index into arrays
///
/// ```
/// use serde_json::json;
/// let doc = json!({"entry": [{"resource": {"id": "obs-1"}}]});
/// let id = hale_cds::prefetch::get_path(&doc, "entry.0.resource.id");
/// assert_eq!(id.and_then(|v| v.as_str()), Some("obs-1"));
/// ```
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for step in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(step)?,
            Value::Array(items) => items.get(step.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// A string at a dot-separated path
pub fn get_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    get_path(value, path).and_then(Value::as_str)
}

/// The resources inside a value that may be a FHIR Bundle, a bare array,
/// or a single resource
///
/// Bundle entries are unwrapped to their `resource`; anything else is
/// passed through as-is.
pub fn resources(value: &Value) -> Vec<&Value> {
    if let Some(entries) = get_path(value, "entry").and_then(Value::as_array) {
        return entries
            .iter()
            .map(|entry| entry.get("resource").unwrap_or(entry))
            .collect();
    }
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// The codings of a CodeableConcept as (system, code, display) triples
pub fn codings(concept: &Value) -> Vec<(&str, &str, &str)> {
    concept
        .get("coding")
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .map(|coding| {
                    (
                        coding.get("system").and_then(Value::as_str).unwrap_or(""),
                        coding.get("code").and_then(Value::as_str).unwrap_or(""),
                        coding.get("display").and_then(Value::as_str).unwrap_or(""),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The human-readable text of a CodeableConcept: `text`, else the first
/// coding's display
pub fn concept_text(concept: &Value) -> Option<&str> {
    concept
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| {
            codings(concept)
                .into_iter()
                .map(|(_, _, display)| display)
                .find(|display| !display.is_empty())
        })
}
