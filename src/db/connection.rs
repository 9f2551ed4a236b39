//! Connection pool interface consumed by the transaction session and the
//! execute tool.
//!
//! The session never talks to a driver directly. It asks a [`ConnectionPool`]
//! for a [`PooledConnection`], drives BEGIN/COMMIT/ROLLBACK through it, and
//! hands it back with [`PooledConnection::release`]. Because `release` takes the
//! connection by value, a connection cannot be released twice or used after
//! release.

use std::future::Future;

use crate::error::DriverError;
use crate::models::{QueryParam, StatementOutput};
use crate::tools::sql_validator::StatementKind;

/// A connection checked out of a pool.
pub trait PooledConnection: Send + Sized {
    /// Run one statement on this connection.
    ///
    /// `kind` decides whether rows are fetched or only the affected count is
    /// reported.
    fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
        params: &[QueryParam],
    ) -> impl Future<Output = Result<StatementOutput, DriverError>> + Send;

    /// Open a transaction on this connection.
    fn begin_transaction(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Commit the open transaction.
    fn commit(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Return the connection to its pool.
    fn release(self);
}

/// Source of pooled connections. Must hand out distinct connections to
/// concurrent callers.
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: PooledConnection + 'static;

    fn acquire(&self) -> impl Future<Output = Result<Self::Connection, DriverError>> + Send;
}
