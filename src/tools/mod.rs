//! MCP tool implementations.
//!
//! - `sql_validator`: statement classification and text rewriting
//! - `guard`: the policy check every statement passes before execution
//! - `execute`: `execute_sql` and `validate_sql`
//! - `transaction`: begin, commit, rollback and status of the session transaction

pub mod execute;
pub mod guard;
pub mod sql_validator;
pub mod transaction;

pub use execute::{ExecuteInput, ExecuteOutput, ExecuteToolHandler, ValidateInput, ValidateOutput};
pub use guard::{SecurityPolicy, SqlGuard, ValidationOutcome};
pub use sql_validator::StatementKind;
pub use transaction::{
    EndTransactionInput, TransactionOutput, TransactionStatusOutput, TransactionToolHandler,
};
