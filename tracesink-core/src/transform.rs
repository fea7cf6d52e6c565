//! Positional row form of validated events, in insert column order.

use crate::models::{GraphEvent, TraceEvent};
use chrono::{DateTime, Utc};

pub const TRACE_COLUMNS: [&str; 12] = [
    "ts",
    "agent_id",
    "node_name",
    "thread_type",
    "thread_id",
    "event_type",
    "event_code",
    "event_name",
    "is_end",
    "task_id",
    "core_id",
    "func_name",
];

pub const GRAPH_COLUMNS: [&str; 17] = [
    "ts",
    "run_id",
    "app_id",
    "type",
    "task_id",
    "task_name",
    "producer_id",
    "producer_name",
    "consumer_id",
    "consumer_name",
    "data_id",
    "data_version",
    "edge_kind",
    "group_name",
    "sync_id",
    "master_name",
    "payload",
];

pub type TraceRow = (
    DateTime<Utc>,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    String,
    bool,
    Option<i64>,
    Option<i64>,
    Option<String>,
);

/// The last column is the canonical payload text, `None` for SQL NULL.
pub type GraphRow = (
    DateTime<Utc>,
    Option<String>,
    i64,
    String,
    Option<i64>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
);

pub fn to_trace_rows(events: Vec<TraceEvent>) -> Vec<TraceRow> {
    events
        .into_iter()
        .map(|e| {
            (
                e.ts,
                e.agent_id,
                e.node_name,
                e.thread_type,
                e.thread_id,
                e.event_type,
                e.event_code,
                e.event_name,
                e.is_end,
                e.task_id,
                e.core_id,
                e.func_name,
            )
        })
        .collect()
}

pub fn to_graph_rows(events: Vec<GraphEvent>) -> Vec<GraphRow> {
    events
        .into_iter()
        .map(|e| {
            (
                e.ts,
                e.run_id,
                e.app_id,
                e.kind,
                e.task_id,
                e.task_name,
                e.producer_id,
                e.producer_name,
                e.consumer_id,
                e.consumer_name,
                e.data_id,
                e.data_version,
                e.edge_kind,
                e.group_name,
                e.sync_id,
                e.master_name,
                e.payload.map(|p| p.into_inner()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate_graph_batch, validate_trace_batch};
    use serde_json::json;

    #[test]
    fn test_trace_rows_keep_batch_order_and_columns() {
        let body = serde_json::to_vec(&json!([
            {"ts": "2024-01-01T00:00:00Z", "agent_id": "a1", "node_name": "n1",
             "thread_type": "worker", "thread_id": 3, "event_type": 1,
             "event_code": 100, "event_name": "task_start", "task_id": 42},
            {"ts": "2024-01-01T00:00:02Z", "agent_id": "a1", "node_name": "n1",
             "thread_type": "worker", "thread_id": 3, "event_type": 1,
             "event_code": 0, "event_name": "task_end", "is_end": true,
             "core_id": 5, "func_name": "increment"}
        ]))
        .unwrap();
        let rows = to_trace_rows(validate_trace_batch(&body).unwrap());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].7, "task_start");
        assert!(!rows[0].8);
        assert_eq!(rows[0].9, Some(42));
        assert_eq!(rows[0].11, None);

        assert_eq!(rows[1].7, "task_end");
        assert!(rows[1].8);
        assert_eq!(rows[1].10, Some(5));
        assert_eq!(rows[1].11.as_deref(), Some("increment"));
    }

    #[test]
    fn test_graph_rows_encode_payload_or_null() {
        let body = serde_json::to_vec(&json!([
            {"ts": "2024-01-01T00:00:00Z", "run_id": "run-1", "app_id": 1,
             "type": "task", "task_id": 9, "task_name": "fib",
             "payload": {"z": 1, "a": [true, null]}},
            {"ts": "2024-01-01T00:00:00Z", "app_id": 1, "type": "sync",
             "sync_id": 4, "master_name": "master"},
            {"ts": "2024-01-01T00:00:00Z", "app_id": 1, "type": "group",
             "group_name": "g", "payload": {}}
        ]))
        .unwrap();
        let rows = to_graph_rows(validate_graph_batch(&body).unwrap());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].1.as_deref(), Some("run-1"));
        assert_eq!(rows[0].3, "task");
        assert_eq!(rows[0].16.as_deref(), Some(r#"{"a":[true,null],"z":1}"#));

        assert_eq!(rows[1].14, Some(4));
        assert_eq!(rows[1].15.as_deref(), Some("master"));
        assert_eq!(rows[1].16, None);

        assert_eq!(rows[2].13.as_deref(), Some("g"));
        assert_eq!(rows[2].16.as_deref(), Some("{}"));
    }
}
