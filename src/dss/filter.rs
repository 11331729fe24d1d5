//! JSON filter expressions
//!
//! A filter is a JSON object with exactly one key: either an
//! operator (`$AND`, `$NE`, `$GTE`, `$CONTAINS`) or an attribute
//! path, which means equality. Attribute paths are the dotted serde
//! paths of the row types, e.g. `fs.status` or
//! `stats.phys_spc_free`.

use serde_json::{json, Value};

fn keyed(key: &str, value: Value) -> Value {
    Value::Object(std::iter::once((key.to_string(), value)).collect())
}

/// All clauses must match.
pub fn and(clauses: Vec<Value>) -> Value {
    keyed("$AND", Value::Array(clauses))
}

/// The attribute equals the value.
pub fn eq(path: &str, value: Value) -> Value {
    keyed(path, value)
}

/// The attribute differs from the value (or is absent).
pub fn ne(path: &str, value: Value) -> Value {
    keyed("$NE", keyed(path, value))
}

/// The numeric attribute is at least the value.
pub fn gte(path: &str, value: u64) -> Value {
    keyed("$GTE", keyed(path, json!(value)))
}

/// The array attribute contains the value.
pub fn contains(path: &str, value: Value) -> Value {
    keyed("$CONTAINS", keyed(path, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_shapes() {
        assert_eq!(eq("family", json!("tape")), json!({"family": "tape"}));
        assert_eq!(
            ne("fs.status", json!("blank")),
            json!({"$NE": {"fs.status": "blank"}})
        );
        assert_eq!(
            gte("stats.phys_spc_free", 42),
            json!({"$GTE": {"stats.phys_spc_free": 42}})
        );
        assert_eq!(
            and(vec![eq("id", json!("T0"))]),
            json!({"$AND": [{"id": "T0"}]})
        );
    }
}
