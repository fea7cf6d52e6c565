pub mod graph_event;
pub mod trace_event;

pub use graph_event::{EncodedPayload, GraphEvent};
pub use trace_event::TraceEvent;
