use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A structured payload already encoded to its canonical text form.
///
/// The encoding is compact JSON with object keys in sorted order, so two
/// structurally equal payloads always encode to the same string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn encode(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::to_string(&canonicalize(value)).map(Self)
    }

    pub fn decode(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// Rebuild objects with sorted keys; holds whether or not serde_json keeps
// insertion order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// One node or edge contribution to a task-dependency graph.
///
/// `payload` is `None` when the producer sent no payload (or `null`); an
/// empty object is `Some("{}")`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEvent {
    pub ts: DateTime<Utc>,
    pub run_id: Option<String>,
    pub app_id: i64,
    pub kind: String,
    pub task_id: Option<i64>,
    pub task_name: Option<String>,
    pub producer_id: Option<i64>,
    pub producer_name: Option<String>,
    pub consumer_id: Option<i64>,
    pub consumer_name: Option<String>,
    pub data_id: Option<i64>,
    pub data_version: Option<i64>,
    pub edge_kind: Option<String>,
    pub group_name: Option<String>,
    pub sync_id: Option<i64>,
    pub master_name: Option<String>,
    pub payload: Option<EncodedPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encoding_sorts_keys() {
        let a = EncodedPayload::encode(&json!({"b": 1, "a": {"z": true, "y": null}})).unwrap();
        assert_eq!(a.as_str(), r#"{"a":{"y":null,"z":true},"b":1}"#);
    }

    #[test]
    fn test_empty_object_stays_distinct_from_absent() {
        let empty = EncodedPayload::encode(&json!({})).unwrap();
        assert_eq!(empty.as_str(), "{}");
        assert_eq!(empty.decode().unwrap(), json!({}));
    }

    #[test]
    fn test_decode_restores_nested_structure() {
        let value = json!({"params": [1, 2.5, "x"], "meta": {"depth": 3}});
        let encoded = EncodedPayload::encode(&value).unwrap();
        assert_eq!(encoded.decode().unwrap(), value);
    }
}
