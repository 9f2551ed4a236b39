//! MCP service implementation using rmcp.
//!
//! This module defines the SqlGateService struct with the SQL and transaction
//! tools exposed via the MCP protocol using the rmcp framework's macros.
//! Each service instance owns one transaction session, so one MCP client
//! session maps to at most one open transaction.

use crate::db::{SqlxPool, TransactionSession};
use crate::tools::execute::{
    ExecuteInput, ExecuteOutput, ExecuteToolHandler, ValidateInput, ValidateOutput,
};
use crate::tools::guard::{SecurityPolicy, SqlGuard};
use crate::tools::transaction::{
    EndTransactionInput, TransactionOutput, TransactionStatusOutput, TransactionToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SqlGateService {
    /// Statement execution through the safety gate
    execute: Arc<ExecuteToolHandler<SqlxPool>>,
    /// Transaction lifecycle for this service's session
    transaction: Arc<TransactionToolHandler<SqlxPool>>,
    policy: SecurityPolicy,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl SqlGateService {
    /// Create a new service with its own transaction session.
    ///
    /// # Arguments
    ///
    /// * `pool` - Shared connection pool
    /// * `policy` - Policy every statement is validated against
    /// * `query_timeout_secs` - Timeout for statements that do not set one
    pub fn new(pool: Arc<SqlxPool>, policy: SecurityPolicy, query_timeout_secs: u32) -> Self {
        let session = TransactionSession::shared();
        let guard = Arc::new(SqlGuard::new(policy));
        let execute = ExecuteToolHandler::new(pool.clone(), guard, session.clone())
            .with_default_timeout(query_timeout_secs);
        Self {
            execute: Arc::new(execute),
            transaction: Arc::new(TransactionToolHandler::new(pool, session)),
            policy,
            tool_router: Self::tool_router(),
        }
    }

    /// Roll back this session's transaction if one is still open.
    pub async fn shutdown(&self) {
        self.transaction.rollback_if_active().await;
    }

    fn instructions(&self) -> String {
        let policy = &self.policy;
        format!(
            "SQL tools guarded by a safety policy.\n\
            \n\
            ## Workflow\n\
            1. Send one statement per `execute_sql` call\n\
            2. Use `validate_sql` to check a statement without running it\n\
            3. Group writes with `begin_transaction`, then `commit_transaction` or \
               `rollback_transaction`. Statements in between run on the transaction's connection\n\
            \n\
            ## Policy\n\
            - SELECT results are capped at {} rows (a LIMIT is added when missing)\n\
            - UPDATE and DELETE {} a WHERE clause\n\
            - DDL (CREATE, DROP, ALTER, TRUNCATE, RENAME) is {}\n\
            - Multiple statements per call are {}\n\
            - BEGIN, COMMIT and ROLLBACK are not accepted by `execute_sql`; use the transaction tools",
            policy.max_select_rows,
            if policy.require_where_clause {
                "must include"
            } else {
                "do not need"
            },
            if policy.allow_ddl { "allowed" } else { "rejected" },
            if policy.allow_multiple_statements {
                "allowed"
            } else {
                "rejected"
            },
        )
    }
}

#[tool_router]
impl SqlGateService {
    #[tool(
        description = "Execute a single SQL statement after validating it against the safety policy.\nSELECT without LIMIT gets one added. UPDATE/DELETE need a WHERE clause.\nSupports parameterized queries to prevent SQL injection.\nRuns inside the active transaction if one was started with begin_transaction."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<ExecuteInput>,
    ) -> Result<Json<ExecuteOutput>, McpError> {
        self.execute
            .execute(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Check a SQL statement against the safety policy without executing it.\nReturns the statement kind, the rejection reason if any, and the SQL that would run."
    )]
    async fn validate_sql(&self, Parameters(input): Parameters<ValidateInput>) -> Json<ValidateOutput> {
        Json(self.execute.validate(input))
    }

    #[tool(
        description = "Begin a transaction.\nFails if one is already active. Subsequent execute_sql calls run inside it until commit or rollback."
    )]
    async fn begin_transaction(&self) -> Result<Json<TransactionOutput>, McpError> {
        self.transaction
            .begin_transaction()
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Commit the active transaction.\nIf the commit fails the transaction is rolled back and the error returned."
    )]
    async fn commit_transaction(
        &self,
        Parameters(input): Parameters<EndTransactionInput>,
    ) -> Result<Json<TransactionOutput>, McpError> {
        self.transaction
            .commit(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Roll back the active transaction.")]
    async fn rollback_transaction(
        &self,
        Parameters(input): Parameters<EndTransactionInput>,
    ) -> Result<Json<TransactionOutput>, McpError> {
        self.transaction
            .rollback(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Show the transaction state of this session: NONE, ACTIVE, COMMITTED or ROLLED_BACK."
    )]
    async fn transaction_status(&self) -> Json<TransactionStatusOutput> {
        Json(self.transaction.status().await)
    }
}

#[tool_handler]
impl ServerHandler for SqlGateService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-gate-mcp".to_owned(),
                title: Some("SQL Gate MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(self.instructions()),
        }
    }
}
