//! Transaction management tools.
//!
//! This module implements MCP tools for transaction management:
//! - `begin_transaction`: Start a new transaction
//! - `commit_transaction`: Commit the active transaction
//! - `rollback_transaction`: Roll back the active transaction
//! - `transaction_status`: Report the session's transaction state
//!
//! Each client has one session holding at most one transaction. Statements
//! sent through `execute_sql` while it is active run on its connection.

use crate::db::connection::ConnectionPool;
use crate::db::session::SharedSession;
use crate::error::{DbError, DbResult, TransactionError};
use crate::models::TransactionState;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Input for the commit_transaction and rollback_transaction tools.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EndTransactionInput {
    /// Transaction ID from begin_transaction. If given, it must match the active transaction
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Output from the transaction tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TransactionOutput {
    /// Transaction the call applied to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Session state after the call
    pub state: TransactionState,
    /// Human-readable status message
    pub message: String,
}

/// Output from the transaction_status tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TransactionStatusOutput {
    /// NONE, ACTIVE, COMMITTED or ROLLED_BACK
    pub state: TransactionState,
    /// Current or most recent transaction ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// When the transaction started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds the transaction has been open, only while ACTIVE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

/// Handler for transaction management tools.
pub struct TransactionToolHandler<P: ConnectionPool> {
    pool: Arc<P>,
    session: SharedSession<P::Connection>,
}

impl<P: ConnectionPool> TransactionToolHandler<P> {
    /// Create a new transaction tool handler.
    pub fn new(pool: Arc<P>, session: SharedSession<P::Connection>) -> Self {
        Self { pool, session }
    }

    /// Handle the begin_transaction tool call.
    pub async fn begin_transaction(&self) -> DbResult<TransactionOutput> {
        let mut session = self.session.lock().await;
        let transaction_id = session.begin(self.pool.as_ref()).await?.to_string();

        info!(transaction_id = %transaction_id, "begin_transaction completed");

        Ok(TransactionOutput {
            message: format!(
                "Transaction {} started. Statements sent with execute_sql now run inside it \
                 until commit_transaction or rollback_transaction",
                transaction_id
            ),
            transaction_id: Some(transaction_id),
            state: TransactionState::Active,
        })
    }

    /// Handle the commit_transaction tool call.
    pub async fn commit(&self, input: EndTransactionInput) -> DbResult<TransactionOutput> {
        let mut session = self.session.lock().await;
        check_transaction_id(
            session.transaction_id(),
            input.transaction_id.as_deref(),
            session.is_in_transaction(),
        )?;
        let transaction_id = session.transaction_id().map(String::from);

        let result = session.commit().await;
        if matches!(result, Err(TransactionError::MissingConnection)) {
            warn!(transaction_id = ?transaction_id, "Active session had no connection, resetting");
            session.reset();
        }
        result?;

        Ok(TransactionOutput {
            message: format!(
                "Transaction {} committed",
                transaction_id.as_deref().unwrap_or_default()
            ),
            transaction_id,
            state: session.state(),
        })
    }

    /// Handle the rollback_transaction tool call.
    pub async fn rollback(&self, input: EndTransactionInput) -> DbResult<TransactionOutput> {
        let mut session = self.session.lock().await;
        check_transaction_id(
            session.transaction_id(),
            input.transaction_id.as_deref(),
            session.is_in_transaction(),
        )?;
        let transaction_id = session.transaction_id().map(String::from);

        let result = session.rollback().await;
        if matches!(result, Err(TransactionError::MissingConnection)) {
            warn!(transaction_id = ?transaction_id, "Active session had no connection, resetting");
            session.reset();
        }
        result?;

        Ok(TransactionOutput {
            message: format!(
                "Transaction {} rolled back",
                transaction_id.as_deref().unwrap_or_default()
            ),
            transaction_id,
            state: session.state(),
        })
    }

    /// Handle the transaction_status tool call.
    pub async fn status(&self) -> TransactionStatusOutput {
        let info = self.session.lock().await.info();
        TransactionStatusOutput {
            duration_secs: info.active_duration_secs(),
            state: info.state,
            transaction_id: info.transaction_id,
            started_at: info.started_at,
        }
    }

    /// Roll back the active transaction, if any. Used on shutdown; failures
    /// are logged and otherwise ignored.
    pub async fn rollback_if_active(&self) {
        let mut session = self.session.lock().await;
        if !session.is_in_transaction() {
            return;
        }
        let transaction_id = session.transaction_id().map(String::from);
        match session.rollback().await {
            Ok(()) => info!(transaction_id = ?transaction_id, "Open transaction rolled back"),
            Err(e) => {
                warn!(transaction_id = ?transaction_id, error = %e, "Rollback of open transaction failed");
                if matches!(e, TransactionError::MissingConnection) {
                    session.reset();
                }
            }
        }
    }
}

/// A caller-supplied ID is only checked against an active transaction; with
/// none active the session itself reports the error.
fn check_transaction_id(
    current: Option<&str>,
    requested: Option<&str>,
    active: bool,
) -> DbResult<()> {
    match requested {
        Some(requested) if active && current != Some(requested) => {
            Err(DbError::invalid_input(format!(
                "Transaction {} is not the active transaction ({})",
                requested,
                current.unwrap_or_default()
            )))
        }
        _ => Ok(()),
    }
}
