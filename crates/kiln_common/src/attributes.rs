//! Attribute maps attached to documents and the site configuration.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;

/// Key/value attributes of a document or of the site configuration.
///
/// Backed by a `BTreeMap`, so iteration order (and therefore any digest
/// computed over it) does not depend on insertion order.
pub type Attributes = BTreeMap<String, Value>;

/// Renders a JSON value in canonical form: object keys sorted, no whitespace.
///
/// Used wherever a value must be compared or hashed across runs (filter
/// parameters in rule memory, attribute checksums).
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
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
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Null => out.push_str("null"),
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json never fails to serialize a plain string.
    out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let v = json!({"b": 1, "a": {"d": true, "c": null}});
        assert_eq!(canonical_json(&v), r#"{"a":{"c":null,"d":true},"b":1}"#);
    }

    #[test]
    fn strings_are_escaped() {
        let v = json!("say \"hi\"\n");
        assert_eq!(canonical_json(&v), r#""say \"hi\"\n""#);
    }

    #[test]
    fn arrays_keep_order() {
        let v = json!([3, "x", [false]]);
        assert_eq!(canonical_json(&v), r#"[3,"x",[false]]"#);
    }

    #[test]
    fn attribute_map_order_independent() {
        let mut a = Attributes::new();
        a.insert("title".into(), json!("Home"));
        a.insert("author".into(), json!("Denis"));
        let mut b = Attributes::new();
        b.insert("author".into(), json!("Denis"));
        b.insert("title".into(), json!("Home"));
        let va = Value::Object(a.into_iter().collect());
        let vb = Value::Object(b.into_iter().collect());
        assert_eq!(canonical_json(&va), canonical_json(&vb));
    }
}
