//! # Transport Error Types
//!
//! Structured error handling for the queue transport using thiserror.
//! An empty queue is never an error: receives return `Ok(None)`.

use crate::config::ConfigurationError;
use thiserror::Error;

/// Errors surfaced by the table-backed transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Storage unreachable, pool exhausted or timed out. Never retried internally.
    #[error("Database connection error: {message}")]
    Connection { message: String },

    /// A statement reached the database and failed there
    #[error("Database query error: {operation}: {message}")]
    Query { operation: String, message: String },

    /// Malformed header map, timestamp or duration
    #[error("Message serialization error: {message}")]
    Serialization { message: String },

    /// Operation attempted on a scope that already completed or was abandoned
    #[error("Invalid scope state: cannot {operation} a scope that is {state}")]
    InvalidScopeState {
        operation: &'static str,
        state: &'static str,
    },

    /// Cooperative cancellation observed before or during a storage round trip
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: &'static str },

    /// The existing table cannot back the queue
    #[error("Schema conflict on table {table}: {detail}")]
    SchemaConflict { table: String, detail: String },

    #[error("Invalid name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl TransportError {
    /// Create a database connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database query error
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a message serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn invalid_scope_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidScopeState { operation, state }
    }

    pub fn cancelled(operation: &'static str) -> Self {
        Self::Cancelled { operation }
    }

    /// Create a schema conflict error
    pub fn schema_conflict(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaConflict {
            table: table.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True when the error is a cancellation signal rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// True for storage-level failures (connection or query)
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Query { .. })
    }
}

/// Conversion from sqlx::Error to TransportError
impl From<sqlx::Error> for TransportError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => TransportError::query("database", db_err.to_string()),
            sqlx::Error::RowNotFound => TransportError::query("query", "No rows found"),
            sqlx::Error::ColumnDecode { index, source } => {
                TransportError::serialization(format!("column {index}: {source}"))
            }
            sqlx::Error::Decode(source) => TransportError::serialization(source.to_string()),
            sqlx::Error::PoolTimedOut => {
                TransportError::connection("Timed out acquiring a connection from the pool")
            }
            sqlx::Error::PoolClosed => TransportError::connection("Database pool is closed"),
            sqlx::Error::Configuration(config_err) => {
                TransportError::connection(format!("invalid connection settings: {config_err}"))
            }
            _ => TransportError::connection(err.to_string()),
        }
    }
}

/// Conversion from serde_json::Error to TransportError
impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map_to_connection() {
        let err: TransportError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, TransportError::Connection { .. }));
        assert!(err.is_storage());

        let err: TransportError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, TransportError::Connection { .. }));
    }

    #[test]
    fn test_json_errors_map_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: TransportError = json_err.into();
        assert!(matches!(err, TransportError::Serialization { .. }));
        assert!(!err.is_storage());
    }

    #[test]
    fn test_scope_state_message() {
        let err = TransportError::invalid_scope_state("complete", "completed");
        assert_eq!(
            err.to_string(),
            "Invalid scope state: cannot complete a scope that is completed"
        );
        assert!(TransportError::cancelled("receive").is_cancelled());
    }
}
