use chrono::{DateTime, Utc};

/// One occurrence in a worker thread's execution timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub ts: DateTime<Utc>,
    pub agent_id: String,
    pub node_name: String,
    pub thread_type: String,
    pub thread_id: i64,
    pub event_type: i64,
    pub event_code: i64,
    pub event_name: String,
    pub is_end: bool,
    pub task_id: Option<i64>,
    pub core_id: Option<i64>,
    pub func_name: Option<String>,
}
