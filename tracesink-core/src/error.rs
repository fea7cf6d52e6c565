use thiserror::Error;

/// A batch rejected before any connection was touched.
///
/// `path` addresses the offending element and field (`[3].thread_id`), or
/// `$` when the body as a whole is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {constraint}")]
pub struct ValidationError {
    pub path: String,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            constraint: constraint.into(),
        }
    }

    pub fn body(constraint: impl Into<String>) -> Self {
        Self::new("$", constraint)
    }
}

#[derive(Error, Debug)]
pub enum TracesinkError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Connection error: {0}")]
    Connection(sqlx::Error),

    #[error("Timed out waiting for a pooled connection")]
    PoolTimeout,

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TracesinkError {
    /// Map a failed acquisition onto the pool taxonomy.
    pub fn from_acquire(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            other => Self::Connection(other),
        }
    }

    /// Map a failed statement; pool-level failures keep their own variants.
    pub fn from_query(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            e @ (sqlx::Error::Io(_) | sqlx::Error::Tls(_)) => Self::Connection(e),
            other => Self::Database(other),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Pool saturated or stopped; the caller may resubmit later.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::PoolTimeout | Self::PoolClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_includes_path() {
        let err = ValidationError::new("[2].thread_id", "must be an integer");
        assert_eq!(err.to_string(), "[2].thread_id: must be an integer");

        let wrapped = TracesinkError::from(err);
        assert!(wrapped.is_client_error());
        assert!(!wrapped.is_busy());
    }

    #[test]
    fn test_acquire_timeout_maps_to_pool_timeout() {
        let err = TracesinkError::from_acquire(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TracesinkError::PoolTimeout));
        assert!(err.is_busy());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_query_errors_are_server_side() {
        let err = TracesinkError::from_query(sqlx::Error::RowNotFound);
        assert!(matches!(err, TracesinkError::Database(_)));
        assert!(!err.is_busy());
        assert!(!err.is_client_error());

        let closed = TracesinkError::from_query(sqlx::Error::PoolClosed);
        assert!(matches!(closed, TracesinkError::PoolClosed));
    }
}
