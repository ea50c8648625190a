//! Error types for the data access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Binding-time failures (`Configuration`, `UnsupportedDialect`) are never retried;
//! driver failures are wrapped so the caller keeps the SQL state when one exists.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaoError {
    /// Ambiguous overload, wrong operation kind, bad table convention, conflicting registration.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to build statement: {message} (sql: {sql})")]
    Build { sql: String, message: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "23505" for unique violation
        sql_state: Option<String>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("No pagination dialect supports database '{database}'")]
    UnsupportedDialect { database: String },

    #[error("Mapping error: {message}")]
    Mapping { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Query was cancelled before completion")]
    Cancelled,
}

impl DaoError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a statement build error.
    pub fn build(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn unsupported_dialect(database: impl Into<String>) -> Self {
        Self::UnsupportedDialect {
            database: database.into(),
        }
    }

    /// Create a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Check if this error was raised while binding a call rather than while running it.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::UnsupportedDialect { .. }
        )
    }
}

/// Convert sqlx errors to DaoError.
impl From<sqlx::Error> for DaoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DaoError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DaoError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DaoError::execution("No rows returned", None),
            sqlx::Error::PoolTimedOut => DaoError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DaoError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DaoError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DaoError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DaoError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DaoError::mapping(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DaoError::mapping(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DaoError::mapping(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DaoError::mapping(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DaoError::execution("Database worker crashed", None),
            _ => DaoError::execution(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for data access operations.
pub type DaoResult<T> = Result<T, DaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaoError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_build_error_mentions_sql() {
        let err = DaoError::build("SELEC 1", "syntax error");
        assert!(err.to_string().contains("SELEC 1"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(DaoError::timeout("query", 30).is_retryable());
        assert!(DaoError::connection("err", "sugg").is_retryable());
        assert!(!DaoError::configuration("ambiguous").is_retryable());
        assert!(!DaoError::execution("constraint", None).is_retryable());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(DaoError::configuration("bad").is_configuration());
        assert!(DaoError::unsupported_dialect("Oracle").is_configuration());
        assert!(!DaoError::mapping("bad column").is_configuration());
    }

    #[test]
    fn test_row_not_found_maps_to_execution() {
        let err: DaoError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DaoError::Execution { .. }));
    }

    #[test]
    fn test_pool_closed_has_suggestion() {
        let err: DaoError = sqlx::Error::PoolClosed.into();
        assert_eq!(err.suggestion(), Some("Reconnect to the database"));
    }
}
