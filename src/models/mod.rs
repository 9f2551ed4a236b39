//! Data models for the SQL gate server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionConfigError, DatabaseType, TransactionInfo, TransactionState,
};
pub use query::{
    DEFAULT_QUERY_TIMEOUT_SECS, MAX_QUERY_TIMEOUT_SECS, QueryParam, StatementOutput,
    effective_timeout,
};
