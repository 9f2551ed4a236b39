//! SQL execution tools.
//!
//! This module implements the `execute_sql` and `validate_sql` MCP tools.
//! Every statement passes the safety gate first; only the accepted text is
//! sent to the database. While the session has an active transaction the
//! statement runs on the transaction's connection, otherwise on a connection
//! borrowed from the pool for just this call.

use crate::db::connection::{ConnectionPool, PooledConnection};
use crate::db::session::SharedSession;
use crate::error::{DbError, DbResult, DriverError, TransactionError};
use crate::models::{DEFAULT_QUERY_TIMEOUT_SECS, QueryParam, StatementOutput, effective_timeout};
use crate::tools::guard::{SqlGuard, ValidationOutcome};
use crate::tools::sql_validator::{StatementKind, transaction_control_keyword};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Input for the execute_sql tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteInput {
    /// A single SQL statement. SELECTs without LIMIT get one appended.
    pub sql: String,
    /// Positional parameters for parameterized queries (use ? or $1,$2... placeholders in SQL)
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Execution timeout in seconds. Default: server setting, max: 300
    #[serde(default)]
    pub timeout_secs: Option<u32>,
}

/// Output from the execute_sql tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteOutput {
    /// Statement kind decided by the gate
    pub statement_kind: StatementKind,
    /// SQL actually sent to the database (may include an added LIMIT)
    pub executed_sql: String,
    /// Result rows as key-value maps. Empty for write statements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Number of rows returned
    pub row_count: usize,
    /// Rows changed by INSERT/UPDATE/DELETE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// True if the statement ran inside the active transaction
    pub in_transaction: bool,
    /// Transaction the statement ran in, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ExecuteOutput {
    fn new(
        kind: StatementKind,
        executed_sql: String,
        output: StatementOutput,
        transaction_id: Option<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            statement_kind: kind,
            executed_sql,
            row_count: output.row_count(),
            rows: output.rows,
            rows_affected: output.rows_affected,
            in_transaction: transaction_id.is_some(),
            transaction_id,
            execution_time_ms,
        }
    }
}

/// Input for the validate_sql tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ValidateInput {
    /// SQL statement to check against the policy. Nothing is executed.
    pub sql: String,
}

/// Output from the validate_sql tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ValidateOutput {
    /// Whether the statement would be accepted
    pub accepted: bool,
    /// Statement kind, unset if rejected before classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_kind: Option<StatementKind>,
    /// Why the statement would be rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// SQL that would be executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_sql: Option<String>,
}

impl From<ValidationOutcome> for ValidateOutput {
    fn from(outcome: ValidationOutcome) -> Self {
        Self {
            accepted: outcome.is_accepted(),
            statement_kind: outcome.statement_kind(),
            rejection_reason: outcome.rejection_reason().map(String::from),
            executable_sql: outcome.executable_text().map(String::from),
        }
    }
}

pub struct ExecuteToolHandler<P: ConnectionPool> {
    pool: Arc<P>,
    guard: Arc<SqlGuard>,
    session: SharedSession<P::Connection>,
    default_timeout_secs: u32,
}

impl<P: ConnectionPool> ExecuteToolHandler<P> {
    pub fn new(pool: Arc<P>, guard: Arc<SqlGuard>, session: SharedSession<P::Connection>) -> Self {
        Self {
            pool,
            guard,
            session,
            default_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }

    /// Set the timeout used when a call does not give one.
    pub fn with_default_timeout(mut self, timeout_secs: u32) -> Self {
        self.default_timeout_secs = timeout_secs;
        self
    }

    /// Check a statement against the policy without running it.
    pub fn validate(&self, input: ValidateInput) -> ValidateOutput {
        self.guard.validate(&input.sql).into()
    }

    pub async fn execute(&self, input: ExecuteInput) -> DbResult<ExecuteOutput> {
        if let Some(keyword) = transaction_control_keyword(&input.sql) {
            return Err(DbError::invalid_input(format!(
                "{} cannot be run through execute_sql. Use begin_transaction, \
                 commit_transaction or rollback_transaction instead",
                keyword
            )));
        }

        let outcome = self.guard.validate(&input.sql);
        let (kind, sql) = match (outcome.statement_kind(), outcome.executable_text()) {
            (Some(kind), Some(sql)) if outcome.is_accepted() => (kind, sql.to_string()),
            _ => {
                let reason = outcome
                    .rejection_reason()
                    .unwrap_or("Query rejected")
                    .to_string();
                info!(statement_kind = ?outcome.statement_kind(), reason = %reason, "Query rejected");
                return Err(DbError::policy_rejected(outcome.statement_kind(), reason));
            }
        };

        let timeout_secs = effective_timeout(input.timeout_secs, self.default_timeout_secs);
        let start = Instant::now();

        // Held for the whole call so statements in one session run in order
        let mut session = self.session.lock().await;

        let (output, transaction_id) = if session.is_in_transaction() {
            let transaction_id = session.transaction_id().map(String::from);
            let connection = session
                .connection_mut()
                .ok_or(TransactionError::MissingConnection)?;
            debug!(sql = %sql, transaction_id = ?transaction_id, "Executing in transaction");
            let output =
                run_with_timeout(timeout_secs, connection.execute(&sql, kind, &input.params)).await;
            if matches!(output, Err(DbError::Timeout { .. })) {
                warn!(
                    transaction_id = ?transaction_id,
                    "Statement timed out, transaction left open"
                );
            }
            (output?, transaction_id)
        } else {
            drop(session);
            let mut connection = self.pool.acquire().await?;
            let output =
                run_with_timeout(timeout_secs, connection.execute(&sql, kind, &input.params)).await;
            connection.release();
            (output?, None)
        };

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            statement_kind = %kind,
            row_count = output.row_count(),
            rows_affected = ?output.rows_affected,
            transaction_id = ?transaction_id,
            execution_time_ms = execution_time_ms,
            "Statement executed"
        );

        Ok(ExecuteOutput::new(
            kind,
            sql,
            output,
            transaction_id,
            execution_time_ms,
        ))
    }
}

async fn run_with_timeout<F>(timeout_secs: u32, statement: F) -> DbResult<StatementOutput>
where
    F: Future<Output = Result<StatementOutput, DriverError>>,
{
    match tokio::time::timeout(Duration::from_secs(timeout_secs as u64), statement).await {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => Err(DbError::timeout("statement execution", timeout_secs)),
    }
}
