//! Minimal JSON schema gate: `{"required": [...]}`-style well-formedness,
//! enough to decide whether a candidate abstains from voting.

use serde_json::Value;

/// Parses `text` as JSON and checks it is an object containing every key in
/// `schema`'s `required` array. Returns `Ok(())` when the candidate passes,
/// `Err(reason)` (used verbatim as the `schema_failures` entry) otherwise.
pub fn validate(schema: &str, text: &str) -> Result<(), String> {
    let schema_value: Value = serde_json::from_str(schema).map_err(|e| format!("invalid schema: {e}"))?;
    let required: Vec<String> = schema_value
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let parsed: Value = serde_json::from_str(text).map_err(|e| format!("invalid json: {e}"))?;
    let object = parsed.as_object().ok_or_else(|| "response is not a JSON object".to_string())?;

    let missing: Vec<&str> = required
        .iter()
        .filter(|key| !object.contains_key(key.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing keys: {}", missing.join(", ")));
    }
    Ok(())
}

/// Canonical bucketing key for a response whose text parses as JSON: a
/// sorted-key, separator-free serialization (`serde_json`'s `Map` is
/// `BTreeMap`-backed without the `preserve_order` feature, so this is
/// canonical without an extra sort step).
pub fn canonical_json_key(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    serde_json::to_string(&value).ok().map(|s| format!("json:{s}"))
}
