//! Transaction session: a four-state machine bound to one pooled connection.
//!
//! ```text
//! NONE --begin--> ACTIVE --commit--> COMMITTED
//!                   |  \--commit fails--> ROLLED_BACK
//!                   \--rollback--> ROLLED_BACK
//! ```
//!
//! While ACTIVE the session exclusively owns the connection it acquired on
//! `begin`. Every statement in the transaction runs on that connection via
//! [`TransactionSession::connection_mut`]. Leaving ACTIVE always releases the
//! connection exactly once, whatever the outcome of the COMMIT or ROLLBACK.
//!
//! A session is not meant to be driven concurrently. Callers that share one
//! wrap it in an async mutex.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::connection::{ConnectionPool, PooledConnection};
use crate::error::TransactionError;
use crate::models::{TransactionInfo, TransactionState};

/// A session shared between the tool handlers of one client.
pub type SharedSession<C> = Arc<Mutex<TransactionSession<C>>>;

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

pub struct TransactionSession<C: PooledConnection> {
    state: TransactionState,
    connection: Option<C>,
    transaction_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl<C: PooledConnection> Default for TransactionSession<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PooledConnection> TransactionSession<C> {
    /// Create a session ready to be shared between handlers.
    pub fn shared() -> SharedSession<C> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Create a session in the NONE state.
    pub fn new() -> Self {
        Self {
            state: TransactionState::None,
            connection: None,
            transaction_id: None,
            started_at: None,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state.is_active()
    }

    /// ID of the current or most recent transaction.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn info(&self) -> TransactionInfo {
        TransactionInfo {
            state: self.state,
            transaction_id: self.transaction_id.clone(),
            started_at: self.started_at,
        }
    }

    /// The bound connection while ACTIVE, `None` otherwise.
    ///
    /// Returns the same connection for the whole transaction.
    pub fn connection(&self) -> Option<&C> {
        if self.state.is_active() {
            self.connection.as_ref()
        } else {
            None
        }
    }

    /// Mutable access to the bound connection, for running statements inside
    /// the transaction.
    pub fn connection_mut(&mut self) -> Option<&mut C> {
        if self.state.is_active() {
            self.connection.as_mut()
        } else {
            None
        }
    }

    /// Acquire a connection from `pool` and open a transaction on it.
    ///
    /// Fails with [`TransactionError::AlreadyActive`] while a transaction is
    /// open; nested transactions are not supported. If acquisition or BEGIN
    /// fails, any acquired connection is released and the session returns to
    /// NONE.
    pub async fn begin<P>(&mut self, pool: &P) -> Result<&str, TransactionError>
    where
        P: ConnectionPool<Connection = C>,
    {
        if self.state.is_active() {
            return Err(TransactionError::AlreadyActive);
        }

        let mut connection = match pool.acquire().await {
            Ok(connection) => connection,
            Err(err) => {
                self.clear();
                warn!(error = %err, "Failed to acquire connection for transaction");
                return Err(TransactionError::driver("begin", &err));
            }
        };

        if let Err(err) = connection.begin_transaction().await {
            connection.release();
            self.clear();
            warn!(error = %err, "Failed to open transaction");
            return Err(TransactionError::driver("begin", &err));
        }

        let transaction_id = generate_transaction_id();
        info!(transaction_id = %transaction_id, "Transaction started");

        self.connection = Some(connection);
        self.state = TransactionState::Active;
        self.started_at = Some(Utc::now());
        Ok(self.transaction_id.insert(transaction_id).as_str())
    }

    /// Commit the open transaction and release its connection.
    ///
    /// If COMMIT fails, a ROLLBACK is attempted on the same connection and its
    /// result discarded; the session ends ROLLED_BACK and the COMMIT failure is
    /// returned. The connection is released in every case.
    pub async fn commit(&mut self) -> Result<(), TransactionError> {
        if !self.state.is_active() {
            return Err(TransactionError::NoActiveTransaction {
                operation: "commit",
            });
        }
        let transaction_id = self.transaction_id.clone().unwrap_or_default();
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransactionError::MissingConnection)?;

        let result = connection.commit().await;
        if result.is_err() {
            rollback_after_failed_commit(connection, &transaction_id).await;
        }

        match result {
            Ok(()) => {
                self.finish(TransactionState::Committed);
                info!(transaction_id = %transaction_id, "Transaction committed");
                Ok(())
            }
            Err(err) => {
                self.finish(TransactionState::RolledBack);
                warn!(
                    transaction_id = %transaction_id,
                    error = %err,
                    "Commit failed, transaction rolled back"
                );
                Err(TransactionError::driver("commit", &err))
            }
        }
    }

    /// Roll back the open transaction and release its connection.
    ///
    /// The session ends ROLLED_BACK even if the ROLLBACK command fails; the
    /// failure is still returned.
    pub async fn rollback(&mut self) -> Result<(), TransactionError> {
        if !self.state.is_active() {
            return Err(TransactionError::NoActiveTransaction {
                operation: "rollback",
            });
        }
        let transaction_id = self.transaction_id.clone().unwrap_or_default();
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransactionError::MissingConnection)?;

        let result = connection.rollback().await;
        self.finish(TransactionState::RolledBack);

        match result {
            Ok(()) => {
                info!(transaction_id = %transaction_id, "Transaction rolled back");
                Ok(())
            }
            Err(err) => {
                warn!(
                    transaction_id = %transaction_id,
                    error = %err,
                    "Rollback command failed, connection released"
                );
                Err(TransactionError::driver("rollback", &err))
            }
        }
    }

    /// Force the session back to NONE and forget the connection without
    /// releasing it.
    ///
    /// For recovering an abandoned session. A live transaction is not rolled
    /// back; the dropped connection is left to the pool's own cleanup.
    pub fn reset(&mut self) {
        if self.connection.is_some() {
            debug!(
                transaction_id = ?self.transaction_id,
                "Session reset with a bound connection"
            );
        }
        self.clear();
    }

    fn finish(&mut self, state: TransactionState) {
        if let Some(connection) = self.connection.take() {
            connection.release();
        }
        self.state = state;
    }

    fn clear(&mut self) {
        self.connection = None;
        self.state = TransactionState::None;
        self.transaction_id = None;
        self.started_at = None;
    }
}

/// Best-effort ROLLBACK after a failed COMMIT. Any error is logged and
/// discarded so the COMMIT failure is what the caller sees.
async fn rollback_after_failed_commit<C: PooledConnection>(
    connection: &mut C,
    transaction_id: &str,
) {
    if let Err(err) = connection.rollback().await {
        warn!(
            transaction_id = %transaction_id,
            error = %err,
            "Rollback after failed commit also failed, discarding"
        );
    }
}
