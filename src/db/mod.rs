//! Database layer.
//!
//! - `connection`: the pool/connection interface the core consumes
//! - `session`: the transaction session state machine
//! - `pool`: sqlx-backed implementation for MySQL, PostgreSQL and SQLite
//! - `executor`, `params`, `types`: statement execution, parameter binding and
//!   row conversion for the sqlx implementation

pub mod connection;
pub mod executor;
pub mod params;
pub mod pool;
pub mod session;
pub mod types;

pub use connection::{ConnectionPool, PooledConnection};
pub use pool::{DbPool, SqlxConnection, SqlxPool};
pub use session::{SharedSession, TransactionSession};
