pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod transform;
pub mod validate;

pub use config::TracesinkConfig;
pub use db::{EventPool, PoolState, ScopedConnection};
pub use error::{TracesinkError, ValidationError};
pub use models::{EncodedPayload, GraphEvent, TraceEvent};
