//! Canonical JSON serialization for request signing.
//!
//! The signature is computed over this serialization, and the server
//! reconstructs the same bytes from the same logical data to verify it.
//! Two requirements make that work: object keys are sorted at every depth,
//! and no insignificant whitespace is emitted.

use serde_json::Value;

/// Serialize a JSON value into its canonical form.
///
/// Object keys are emitted in ascending lexicographic byte order at every
/// nesting level; array order is preserved; scalars pass through unchanged.
/// Structurally equal inputs produce byte-identical output regardless of how
/// their maps were built.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(out, &Value::String((*key).clone()));
                out.push(':');
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        scalar => write_scalar(out, scalar),
    }
}

fn write_scalar(out: &mut String, value: &Value) {
    // serde_json's compact writer handles string escaping and number
    // formatting; scalars carry no nested maps so ordering is moot.
    match serde_json::to_string(value) {
        Ok(s) => out.push_str(&s),
        Err(_) => out.push_str("null"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorts_top_level_keys() {
        let value = json!({"zebra": 1, "apple": 2, "mango": 3});
        assert_eq!(canonical_json(&value), r#"{"apple":2,"mango":3,"zebra":1}"#);
    }

    #[test]
    fn test_sorts_nested_keys() {
        let value = json!({
            "b": {"y": 1, "x": 2},
            "a": [{"q": 1, "p": 2}]
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"a":[{"p":2,"q":1}],"b":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn test_preserves_array_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonical_json(&value), "[3,1,2]");
    }

    #[test]
    fn test_no_whitespace() {
        let value = json!({"a": [1, 2], "b": {"c": "d e"}});
        let canonical = canonical_json(&value);
        assert!(!canonical.contains(": "));
        assert!(!canonical.contains(", "));
        assert_eq!(canonical, r#"{"a":[1,2],"b":{"c":"d e"}}"#);
    }

    #[test]
    fn test_idempotent() {
        let value = json!({
            "timestamp": 1700000000000u64,
            "expiry_window": 30000,
            "type": "create_order",
            "data": {"symbol": "BTC", "amount": "0.1"}
        });
        let first = canonical_json(&value);
        let reparsed: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(canonical_json(&reparsed), first);
    }

    #[test]
    fn test_insertion_order_independent() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":{"b":2,"a":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":{"a":3,"b":2},"x":1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_string_escaping() {
        let value = json!({"msg": "line\nbreak \"quoted\""});
        assert_eq!(canonical_json(&value), r#"{"msg":"line\nbreak \"quoted\""}"#);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(canonical_json(&json!(null)), "null");
        assert_eq!(canonical_json(&json!(true)), "true");
        assert_eq!(canonical_json(&json!(42)), "42");
        assert_eq!(canonical_json(&json!("s")), r#""s""#);
    }
}
