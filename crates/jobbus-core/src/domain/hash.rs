//! Structural hash for job data.
//!
//! The id of a job that was published without one is the SHA-256 of the
//! canonical JSON form of its data: object keys sorted, no whitespace.
//! Two structurally equal objects therefore hash the same regardless of the
//! order their keys were inserted in.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the canonical form of `value`.
pub fn structural_hash(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // null / bool / number の表現は serde_json の出力で一意に決まる
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_independent_of_key_order() {
        let mut a = serde_json::Map::new();
        a.insert("a".into(), json!(123));
        a.insert("b".into(), json!({"y": [1, 2], "x": null}));

        let mut b = serde_json::Map::new();
        b.insert("b".into(), json!({"x": null, "y": [1, 2]}));
        b.insert("a".into(), json!(123));

        assert_eq!(
            structural_hash(&Value::Object(a)),
            structural_hash(&Value::Object(b))
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let data = json!({"cow": "mooo", "n": 1.5});
        let first = structural_hash(&data);
        for _ in 0..10 {
            assert_eq!(structural_hash(&data), first);
        }
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(
            structural_hash(&json!({"a": [1, 2]})),
            structural_hash(&json!({"a": [2, 1]}))
        );
    }

    #[test]
    fn canonical_form_sorts_keys_and_escapes_strings() {
        let mut out = String::new();
        write_canonical(&json!({"b": "q\"uote", "a": true}), &mut out);
        assert_eq!(out, r#"{"a":true,"b":"q\"uote"}"#);
    }
}
