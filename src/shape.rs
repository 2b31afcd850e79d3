use serde_json::Value;

/// Converts a collection that drifted between representations back into the
/// canonical array-of-records shape. Legacy writers stored some collections
/// as id-keyed maps, some as arrays, and some wrote scalars over the key by
/// mistake; every reader goes through here before touching records.
pub fn coerce_records(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| v.is_object()).cloned().collect(),
        Value::Object(map) => map.values().filter(|v| v.is_object()).cloned().collect(),
        _ => Vec::new(),
    }
}

/// True when the value is not in the canonical sequence shape and
/// `coerce_records` would change it (used by the self-healing load).
pub fn needs_normalization(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| !v.is_object()),
        _ => true,
    }
}

pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Field-presence test used by the merge engine: null, absent, empty string
/// and empty array are fillable; false and 0 are real values.
pub fn is_falsy_field(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_keeps_arrays_of_objects() {
        let v = json!([{ "id": "a" }, { "id": "b" }]);
        assert_eq!(coerce_records(&v).len(), 2);
        assert!(!needs_normalization(&v));
    }

    #[test]
    fn coerce_flattens_keyed_maps() {
        let v = json!({ "a": { "id": "a" }, "b": { "id": "b" } });
        let records = coerce_records(&v);
        assert_eq!(records.len(), 2);
        assert!(needs_normalization(&v));
    }

    #[test]
    fn coerce_drops_non_object_entries() {
        let v = json!([{ "id": "a" }, 7, "junk", null]);
        assert_eq!(coerce_records(&v).len(), 1);
        assert!(needs_normalization(&v));
    }

    #[test]
    fn scalars_coerce_to_empty() {
        assert!(coerce_records(&json!("oops")).is_empty());
        assert!(coerce_records(&json!(null)).is_empty());
    }

    #[test]
    fn falsy_fields() {
        assert!(is_falsy_field(None));
        assert!(is_falsy_field(Some(&json!(null))));
        assert!(is_falsy_field(Some(&json!(""))));
        assert!(is_falsy_field(Some(&json!([]))));
        assert!(!is_falsy_field(Some(&json!(false))));
        assert!(!is_falsy_field(Some(&json!(0))));
        assert!(!is_falsy_field(Some(&json!("x"))));
    }
}
