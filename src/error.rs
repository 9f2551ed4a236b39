//! Error types for the SQL gate server.
//!
//! Three layers, all built with `thiserror`:
//! - [`DriverError`] is what the connection collaborator reports. Raw driver
//!   errors are classified into a kind plus the few fields callers need.
//! - [`TransactionError`] is raised by the transaction session.
//! - [`DbError`] is what tool handlers return; it converts into MCP error data
//!   with an actionable suggestion.

use thiserror::Error;

use crate::tools::sql_validator::StatementKind;

/// Coarse category of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Network, TLS, protocol or pool-closed failures.
    Connection,
    /// The database rejected the statement.
    Statement,
    /// Pool acquisition timed out.
    Timeout,
    /// Decoding or other client-side failures.
    Internal,
}

/// Structured failure reported by a pooled connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
    /// e.g., "42P01" for undefined table
    pub sql_state: Option<String>,
    /// Statement that was running when the failure happened, if known.
    pub statement: Option<String>,
    /// Configured wait that ran out, for [`DriverErrorKind::Timeout`].
    pub timeout_secs: Option<u32>,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql_state: None,
            statement: None,
            timeout_secs: None,
        }
    }

    /// Generic failure for driver errors that carry no usable message.
    pub fn unknown() -> Self {
        Self::new(DriverErrorKind::Internal, "Unknown database error")
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let error = DriverError::new(DriverErrorKind::Statement, db_err.message());
                match db_err.code() {
                    Some(code) => error.with_sql_state(code.to_string()),
                    None => error,
                }
            }
            sqlx::Error::Configuration(msg) => {
                DriverError::new(DriverErrorKind::Connection, msg.to_string())
            }
            sqlx::Error::Io(io_err) => {
                DriverError::new(DriverErrorKind::Connection, format!("I/O error: {}", io_err))
            }
            sqlx::Error::Tls(tls_err) => {
                DriverError::new(DriverErrorKind::Connection, format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                DriverError::new(DriverErrorKind::Connection, format!("Protocol error: {}", msg))
            }
            sqlx::Error::PoolClosed => {
                DriverError::new(DriverErrorKind::Connection, "Connection pool is closed")
            }
            sqlx::Error::PoolTimedOut => DriverError::new(
                DriverErrorKind::Timeout,
                "Timed out waiting for a pooled connection",
            ),
            sqlx::Error::RowNotFound => {
                DriverError::new(DriverErrorKind::Statement, "No rows returned")
            }
            sqlx::Error::ColumnNotFound(col) => DriverError::new(
                DriverErrorKind::Statement,
                format!("Column not found: {}", col),
            ),
            sqlx::Error::ColumnDecode { index, source } => DriverError::new(
                DriverErrorKind::Internal,
                format!("Failed to decode column {}: {}", index, source),
            ),
            sqlx::Error::Decode(source) => {
                DriverError::new(DriverErrorKind::Internal, format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => {
                DriverError::new(DriverErrorKind::Internal, "Database worker crashed")
            }
            _ => DriverError::unknown(),
        }
    }
}

/// Failures of the transaction session.
///
/// Driver causes are folded into the message rather than kept as a source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction already in progress. Commit or roll it back before starting another")]
    AlreadyActive,

    #[error("No active transaction to {operation}")]
    NoActiveTransaction { operation: &'static str },

    #[error("Failed to {operation} transaction: {cause}")]
    Driver {
        operation: &'static str,
        cause: String,
    },

    #[error("No active connection for transaction")]
    MissingConnection,
}

impl TransactionError {
    pub(crate) fn driver(operation: &'static str, cause: &DriverError) -> Self {
        Self::Driver {
            operation,
            cause: cause.message.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        sql_state: Option<String>,
        statement: Option<String>,
        suggestion: String,
    },

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Query rejected by policy: {reason}")]
    PolicyRejected {
        statement_kind: Option<StatementKind>,
        reason: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            statement: None,
            suggestion: suggestion.into(),
        }
    }

    /// Create a policy rejection.
    pub fn policy_rejected(statement_kind: Option<StatementKind>, reason: impl Into<String>) -> Self {
        Self::PolicyRejected {
            statement_kind,
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Transaction(TransactionError::AlreadyActive) => {
                Some("Call commit_transaction or rollback_transaction first")
            }
            Self::Transaction(TransactionError::NoActiveTransaction { .. }) => {
                Some("Call begin_transaction first")
            }
            Self::PolicyRejected { reason, .. } => Some(policy_suggestion(reason)),
            Self::Timeout { .. } => {
                Some("Consider increasing the timeout or optimizing the query")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

fn policy_suggestion(reason: &str) -> &'static str {
    if reason.contains("WHERE clause") {
        "Add a WHERE clause that selects the rows to change"
    } else if reason.contains("Multiple statements") {
        "Split the statements into separate calls"
    } else if reason.contains("DDL") {
        "Schema changes are disabled on this server"
    } else {
        "Provide a single non-empty SQL statement"
    }
}

impl From<DriverError> for DbError {
    fn from(err: DriverError) -> Self {
        match err.kind {
            DriverErrorKind::Connection => DbError::connection(
                err.message,
                "Check network connectivity and database server status",
            ),
            DriverErrorKind::Timeout => match err.timeout_secs {
                Some(secs) => DbError::timeout("connection pool acquire", secs),
                None => DbError::connection(
                    err.message,
                    "All pooled connections are busy; retry once running statements finish",
                ),
            },
            DriverErrorKind::Statement => DbError::Database {
                message: err.message,
                sql_state: err.sql_state,
                statement: err.statement,
                suggestion: "Check the SQL syntax and referenced objects".to_string(),
            },
            DriverErrorKind::Internal => DbError::internal(err.message),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DriverError::from(err).into()
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion field in the `data` object when available.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            DbError::InvalidInput { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),

            DbError::PolicyRejected { statement_kind, .. } => {
                let data = serde_json::json!({
                    "suggestion": err.suggestion(),
                    "statement_kind": statement_kind,
                });
                rmcp::ErrorData::invalid_params(err.to_string(), Some(data))
            }

            DbError::Transaction(tx_err) => match tx_err {
                TransactionError::NoActiveTransaction { .. } => {
                    rmcp::ErrorData::resource_not_found(err.to_string(), data)
                }
                TransactionError::AlreadyActive => {
                    rmcp::ErrorData::invalid_params(err.to_string(), data)
                }
                TransactionError::Driver { .. } | TransactionError::MissingConnection => {
                    rmcp::ErrorData::internal_error(err.to_string(), data)
                }
            },

            // Connection, Timeout -> internal_error (with implicit retryable flag)
            DbError::Connection { .. } | DbError::Timeout { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), data)
            }

            DbError::Database {
                message,
                sql_state,
                statement,
                ..
            } => {
                let mut msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                if let Some(stmt) = statement {
                    msg.push_str(&format!(" [statement: {}]", stmt));
                }
                rmcp::ErrorData::invalid_params(msg, data)
            }

            DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
