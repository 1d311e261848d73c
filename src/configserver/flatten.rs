//! Flattening of nested property documents into dot-joined keys.

use serde_json::{Map, Value};

/// Separator used between path segments of flattened keys
pub const KEY_DELIMITER: &str = ".";

/// Flatten a nested document using `.` between path segments
///
/// `{"a": {"b": 1}}` becomes `{"a.b": 1}`. Scalars and arrays are kept as they
/// are. An empty nested object stays in the output as a leaf so the key is not
/// lost.
pub fn flatten(nested: &Map<String, Value>) -> Map<String, Value> {
    flatten_with(nested, KEY_DELIMITER)
}

/// Flatten a nested document with a custom delimiter
pub fn flatten_with(nested: &Map<String, Value>, delimiter: &str) -> Map<String, Value> {
    let mut out = Map::new();
    let mut path = Vec::new();
    flatten_into(nested, &mut path, delimiter, &mut out);
    out
}

fn flatten_into<'a>(
    nested: &'a Map<String, Value>,
    path: &mut Vec<&'a str>,
    delimiter: &str,
    out: &mut Map<String, Value>,
) {
    for (key, value) in nested {
        path.push(key.as_str());
        match value {
            Value::Object(child) if !child.is_empty() => {
                flatten_into(child, path, delimiter, out);
            }
            leaf => {
                out.insert(path.join(delimiter), leaf.clone());
            }
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_flatten_nested_document() {
        let nested = object(json!({
            "a": { "b": 1 },
            "server": {
                "port": 8080,
                "tls": { "enabled": true }
            },
            "name": "svc"
        }));

        let flat = flatten(&nested);

        assert_eq!(flat.len(), 4);
        assert_eq!(flat["a.b"], json!(1));
        assert_eq!(flat["server.port"], json!(8080));
        assert_eq!(flat["server.tls.enabled"], json!(true));
        assert_eq!(flat["name"], json!("svc"));
    }

    #[test]
    fn test_leaves_are_untouched() {
        let nested = object(json!({
            "list": [1, { "x": 2 }],
            "nothing": null,
            "ratio": 0.5
        }));

        let flat = flatten(&nested);

        assert_eq!(flat["list"], json!([1, { "x": 2 }]));
        assert_eq!(flat["nothing"], Value::Null);
        assert_eq!(flat["ratio"], json!(0.5));
    }

    #[test]
    fn test_empty_object_is_kept_as_leaf() {
        let nested = object(json!({ "feature": { "flags": {} } }));

        let flat = flatten(&nested);

        assert_eq!(flat.len(), 1);
        assert_eq!(flat["feature.flags"], json!({}));
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let nested = object(json!({
            "db": { "pool": { "min": 1, "max": 10 }, "url": "postgres://db" },
            "empty": {},
            "tags": ["a", "b"]
        }));

        let once = flatten(&nested);
        let twice = flatten(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let nested = object(json!({
            "z": { "y": { "x": 1 } },
            "a": { "b": 2 },
            "m": 3
        }));

        let first = flatten(&nested);
        for _ in 0..10 {
            assert_eq!(flatten(&nested), first);
        }
    }

    #[test]
    fn test_custom_delimiter() {
        let nested = object(json!({ "a": { "b": { "c": "deep" } } }));

        let flat = flatten_with(&nested, "/");

        assert_eq!(flat["a/b/c"], json!("deep"));
    }
}
