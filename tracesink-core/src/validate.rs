//! Schema validation for incoming batches.
//!
//! Every element is checked field by field against the fixed trace or graph
//! record shape. The first violation rejects the whole batch; nothing is
//! accepted partially. Unknown fields are ignored.

use crate::error::ValidationError;
use crate::models::{EncodedPayload, GraphEvent, TraceEvent};
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde_json::{Map, Value};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Numeric timestamps above this magnitude are epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 2e10;

/// Years a Postgres `timestamptz` can hold (4713 BC is year -4712).
const MIN_STORABLE_YEAR: i32 = -4712;
const MAX_STORABLE_YEAR: i32 = 294_276;

pub fn validate_trace_batch(body: &[u8]) -> Result<Vec<TraceEvent>, ValidationError> {
    parse_array(body)?
        .iter()
        .enumerate()
        .map(|(index, element)| Fields::new(index, element).and_then(|f| trace_event(&f)))
        .collect()
}

pub fn validate_graph_batch(body: &[u8]) -> Result<Vec<GraphEvent>, ValidationError> {
    parse_array(body)?
        .iter()
        .enumerate()
        .map(|(index, element)| Fields::new(index, element).and_then(|f| graph_event(&f)))
        .collect()
}

fn trace_event(f: &Fields<'_>) -> Result<TraceEvent, ValidationError> {
    Ok(TraceEvent {
        ts: f.required_timestamp("ts")?,
        agent_id: f.required_str("agent_id")?,
        node_name: f.required_str("node_name")?,
        thread_type: f.required_str("thread_type")?,
        thread_id: f.required_int("thread_id")?,
        event_type: f.required_int("event_type")?,
        event_code: f.required_int("event_code")?,
        event_name: f.required_str("event_name")?,
        is_end: f.bool_or("is_end", false)?,
        task_id: f.optional_int("task_id")?,
        core_id: f.optional_int("core_id")?,
        func_name: f.optional_str("func_name")?,
    })
}

fn graph_event(f: &Fields<'_>) -> Result<GraphEvent, ValidationError> {
    Ok(GraphEvent {
        ts: f.required_timestamp("ts")?,
        run_id: f.optional_str("run_id")?,
        app_id: f.required_int("app_id")?,
        kind: f.required_str("type")?,
        task_id: f.optional_int("task_id")?,
        task_name: f.optional_str("task_name")?,
        producer_id: f.optional_int("producer_id")?,
        producer_name: f.optional_str("producer_name")?,
        consumer_id: f.optional_int("consumer_id")?,
        consumer_name: f.optional_str("consumer_name")?,
        data_id: f.optional_int("data_id")?,
        data_version: f.optional_int("data_version")?,
        edge_kind: f.optional_str("edge_kind")?,
        group_name: f.optional_str("group_name")?,
        sync_id: f.optional_int("sync_id")?,
        master_name: f.optional_str("master_name")?,
        payload: f.optional_payload("payload")?,
    })
}

fn parse_array(body: &[u8]) -> Result<Vec<Value>, ValidationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::body(format!("invalid JSON: {}", e)))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ValidationError::body("must be a JSON array of events")),
    }
}

/// Typed accessors over one batch element, reporting `[index].field` paths.
struct Fields<'a> {
    index: usize,
    obj: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(index: usize, element: &'a Value) -> Result<Self, ValidationError> {
        match element.as_object() {
            Some(obj) => Ok(Self { index, obj }),
            None => Err(ValidationError::new(
                format!("[{}]", index),
                "must be a JSON object",
            )),
        }
    }

    fn error(&self, field: &str, constraint: &str) -> ValidationError {
        ValidationError::new(format!("[{}].{}", self.index, field), constraint)
    }

    // Missing and explicit null are both treated as absent.
    fn present(&self, field: &str) -> Option<&'a Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    fn required(&self, field: &str) -> Result<&'a Value, ValidationError> {
        self.present(field)
            .ok_or_else(|| self.error(field, "field required"))
    }

    fn required_str(&self, field: &str) -> Result<String, ValidationError> {
        let value = self.required(field)?;
        self.as_string(field, value)
    }

    fn optional_str(&self, field: &str) -> Result<Option<String>, ValidationError> {
        self.present(field)
            .map(|value| self.as_string(field, value))
            .transpose()
    }

    fn as_string(&self, field: &str, value: &Value) -> Result<String, ValidationError> {
        let s = value
            .as_str()
            .ok_or_else(|| self.error(field, "must be a string"))?;
        if s.contains('\0') {
            return Err(self.error(field, "must not contain NUL characters"));
        }
        Ok(s.to_owned())
    }

    fn required_int(&self, field: &str) -> Result<i64, ValidationError> {
        let value = self.required(field)?;
        self.as_int(field, value)
    }

    fn optional_int(&self, field: &str) -> Result<Option<i64>, ValidationError> {
        self.present(field)
            .map(|value| self.as_int(field, value))
            .transpose()
    }

    fn as_int(&self, field: &str, value: &Value) -> Result<i64, ValidationError> {
        match value {
            Value::Number(n) if !n.is_f64() => n
                .as_i64()
                .ok_or_else(|| self.error(field, "must be an integer in signed 64-bit range")),
            // whole-valued floats such as 3.0 are integers
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= -(2f64.powi(63)) && f < 2f64.powi(63) => {
                    Ok(f as i64)
                }
                _ => Err(self.error(field, "must be an integer")),
            },
            _ => Err(self.error(field, "must be an integer")),
        }
    }

    fn bool_or(&self, field: &str, default: bool) -> Result<bool, ValidationError> {
        match self.present(field) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.error(field, "must be a boolean")),
        }
    }

    fn required_timestamp(&self, field: &str) -> Result<DateTime<Utc>, ValidationError> {
        let value = self.required(field)?;
        let ts =
            parse_timestamp(value).ok_or_else(|| self.error(field, "must be a valid datetime"))?;
        if !(MIN_STORABLE_YEAR..=MAX_STORABLE_YEAR).contains(&ts.year()) {
            return Err(self.error(field, "is outside the storable datetime range"));
        }
        Ok(ts)
    }

    fn optional_payload(&self, field: &str) -> Result<Option<EncodedPayload>, ValidationError> {
        match self.present(field) {
            None => Ok(None),
            Some(value) if value.is_object() => {
                if let Some(at) = find_nul(value, String::new()) {
                    return Err(self.error(
                        field,
                        &format!("must not contain NUL characters (at {})", at),
                    ));
                }
                EncodedPayload::encode(value)
                    .map(Some)
                    .map_err(|e| self.error(field, &format!("cannot be encoded: {}", e)))
            }
            Some(_) => Err(self.error(field, "must be a JSON object")),
        }
    }
}

/// Location of the first key or string value holding a NUL, which `jsonb`
/// cannot store.
fn find_nul(value: &Value, at: String) -> Option<String> {
    match value {
        Value::String(s) if s.contains('\0') => Some(at),
        Value::Object(map) => map.iter().find_map(|(key, v)| {
            let child = format!("{}.{}", at, key);
            if key.contains('\0') {
                Some(child)
            } else {
                find_nul(v, child)
            }
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_nul(v, format!("{}[{}]", at, i))),
        _ => None,
    }
}

/// RFC 3339, naive ISO-8601 (taken as UTC), or Unix epoch seconds.
/// Epoch values above 2e10 in magnitude are read as milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => {
            if let Some(whole) = n.as_i64() {
                if (whole as f64).abs() > EPOCH_MILLIS_THRESHOLD {
                    return DateTime::from_timestamp_millis(whole);
                }
                return DateTime::from_timestamp(whole, 0);
            }
            let value = n.as_f64()?;
            if !value.is_finite() {
                return None;
            }
            let (units_per_sec, nanos_per_unit) = if value.abs() > EPOCH_MILLIS_THRESHOLD {
                (1_000_i64, 1_000_000_i64)
            } else {
                (1, 1_000_000_000)
            };
            let whole = value.floor();
            let frac_nanos = ((value - whole) * nanos_per_unit as f64).round() as i64;
            let whole = whole as i64;
            let nanos = whole.rem_euclid(units_per_sec) * nanos_per_unit + frac_nanos;
            DateTime::from_timestamp(
                whole.div_euclid(units_per_sec),
                nanos.clamp(0, 999_999_999) as u32,
            )
        }
        _ => None,
    }
}
