//! SQL Gate MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools that let AI
//! assistants run SQL against a database (SQLite, PostgreSQL, MySQL) through a
//! safety gate, with explicit transactions bound to a single connection.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::SqlGateService;
pub use tools::guard::{SecurityPolicy, SqlGuard, ValidationOutcome};
