//! SQL safety gate.
//!
//! [`SqlGuard::validate`] runs the policy checks in a fixed order and stops at
//! the first rejection, so the reason returned for a given query and policy is
//! always the same. The gate never touches the database and never returns an
//! error for bad input: a rejected query is a normal [`ValidationOutcome`].

use serde::Serialize;

use super::sql_validator::{
    StatementKind, apply_row_limit, classify_statement, has_multiple_statements,
    has_where_clause,
};

/// Immutable policy toggles applied by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecurityPolicy {
    /// Row ceiling appended to SELECT statements without a LIMIT.
    pub max_select_rows: u32,
    /// Permit CREATE, DROP, ALTER, TRUNCATE and RENAME.
    pub allow_ddl: bool,
    /// Permit `;`-separated statement sequences.
    pub allow_multiple_statements: bool,
    /// UPDATE and DELETE must carry a WHERE clause.
    pub require_where_clause: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_select_rows: 1000,
            allow_ddl: false,
            allow_multiple_statements: false,
            require_where_clause: true,
        }
    }
}

/// Decision produced by [`SqlGuard::validate`].
///
/// Either `executable_text` or `rejection_reason` is set, never both. The
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statement_kind: Option<StatementKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    executable_text: Option<String>,
}

impl ValidationOutcome {
    fn accepted(kind: StatementKind, executable_text: String) -> Self {
        Self {
            accepted: true,
            rejection_reason: None,
            statement_kind: Some(kind),
            executable_text: Some(executable_text),
        }
    }

    fn rejected(kind: Option<StatementKind>, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            rejection_reason: Some(reason.into()),
            statement_kind: kind,
            executable_text: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Unset when the query was rejected before classification ran.
    pub fn statement_kind(&self) -> Option<StatementKind> {
        self.statement_kind
    }

    /// The query to actually run. SELECTs may have gained a LIMIT.
    pub fn executable_text(&self) -> Option<&str> {
        self.executable_text.as_deref()
    }
}

/// Policy engine. Stateless apart from its policy, so one instance can be
/// shared across sessions.
#[derive(Debug, Clone, Default)]
pub struct SqlGuard {
    policy: SecurityPolicy,
}

impl SqlGuard {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Validate a query against the policy.
    ///
    /// Checks run in this order:
    /// 1. empty query
    /// 2. multiple statements (unless allowed)
    /// 3. classification
    /// 4. DDL (unless allowed)
    /// 5. WHERE clause on UPDATE/DELETE (if required)
    /// 6. row limit on SELECT
    ///
    /// # Examples
    ///
    /// ```
    /// use sql_gate_mcp::tools::guard::{SecurityPolicy, SqlGuard};
    /// use sql_gate_mcp::tools::sql_validator::StatementKind;
    ///
    /// let guard = SqlGuard::new(SecurityPolicy { max_select_rows: 50, ..Default::default() });
    ///
    /// let outcome = guard.validate("SELECT id FROM t WHERE id=1");
    /// assert!(outcome.is_accepted());
    /// assert_eq!(outcome.executable_text(), Some("SELECT id FROM t WHERE id=1 LIMIT 50"));
    ///
    /// let outcome = guard.validate("DELETE FROM users");
    /// assert!(!outcome.is_accepted());
    /// assert_eq!(outcome.statement_kind(), Some(StatementKind::Delete));
    /// ```
    pub fn validate(&self, sql: &str) -> ValidationOutcome {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return ValidationOutcome::rejected(None, "Query cannot be empty");
        }

        if !self.policy.allow_multiple_statements && has_multiple_statements(trimmed) {
            return ValidationOutcome::rejected(
                None,
                "Multiple statements are not allowed. Send one statement per call",
            );
        }

        let kind = classify_statement(trimmed);

        if kind == StatementKind::Ddl && !self.policy.allow_ddl {
            return ValidationOutcome::rejected(
                Some(kind),
                "DDL operations (CREATE, DROP, ALTER, TRUNCATE, RENAME) are not allowed",
            );
        }

        if matches!(kind, StatementKind::Update | StatementKind::Delete)
            && self.policy.require_where_clause
            && !has_where_clause(trimmed)
        {
            return ValidationOutcome::rejected(
                Some(kind),
                format!("{} statements must include a WHERE clause", kind),
            );
        }

        let executable_text = if kind == StatementKind::Select {
            apply_row_limit(trimmed, self.policy.max_select_rows)
        } else {
            trimmed.to_string()
        };

        ValidationOutcome::accepted(kind, executable_text)
    }
}

/// Validate `sql` against `policy` without keeping a guard around.
pub fn validate(sql: &str, policy: &SecurityPolicy) -> ValidationOutcome {
    SqlGuard::new(*policy).validate(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> SqlGuard {
        SqlGuard::new(SecurityPolicy::default())
    }

    fn permissive() -> SqlGuard {
        SqlGuard::new(SecurityPolicy {
            max_select_rows: 1000,
            allow_ddl: true,
            allow_multiple_statements: true,
            require_where_clause: false,
        })
    }

    fn assert_rejected(outcome: &ValidationOutcome, needle: &str) {
        assert!(!outcome.is_accepted(), "expected rejection: {:?}", outcome);
        assert!(outcome.executable_text().is_none());
        let reason = outcome.rejection_reason().expect("reason present");
        assert!(reason.contains(needle), "reason '{}' lacks '{}'", reason, needle);
    }

    // =========================================================================
    // Empty input
    // =========================================================================

    #[test]
    fn test_empty_query_rejected() {
        for sql in ["", "   ", "\n\t"] {
            let outcome = strict().validate(sql);
            assert_rejected(&outcome, "Query cannot be empty");
            assert_eq!(outcome.statement_kind(), None);
        }
    }

    // =========================================================================
    // Multiple statements
    // =========================================================================

    #[test]
    fn test_multiple_statements_rejected_before_classification() {
        let outcome = strict().validate("SELECT 1; DROP TABLE t");
        assert_rejected(&outcome, "Multiple statements");
        assert_eq!(outcome.statement_kind(), None);
    }

    #[test]
    fn test_multiple_statements_allowed_by_policy() {
        let outcome = permissive().validate("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)");
        assert!(outcome.is_accepted());
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Insert));
    }

    #[test]
    fn test_trailing_semicolon_is_single_statement() {
        let outcome = strict().validate("INSERT INTO t VALUES (1);");
        assert!(outcome.is_accepted());
        assert_eq!(
            outcome.executable_text(),
            Some("INSERT INTO t VALUES (1);")
        );
    }

    // =========================================================================
    // DDL
    // =========================================================================

    #[test]
    fn test_ddl_rejected_by_default() {
        let outcome = strict().validate("DROP TABLE users");
        assert_rejected(&outcome, "DDL");
        assert_rejected(&outcome, "TRUNCATE");
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Ddl));
    }

    #[test]
    fn test_ddl_allowed_by_policy() {
        let outcome = permissive().validate("CREATE TABLE t (id INT)");
        assert!(outcome.is_accepted());
        assert_eq!(outcome.executable_text(), Some("CREATE TABLE t (id INT)"));
    }

    // =========================================================================
    // WHERE clause
    // =========================================================================

    #[test]
    fn test_delete_without_where_rejected() {
        let outcome = strict().validate("DELETE FROM users");
        assert_rejected(&outcome, "WHERE clause");
        assert_rejected(&outcome, "DELETE");
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Delete));
    }

    #[test]
    fn test_update_without_where_rejected() {
        let outcome = strict().validate("update users set active = false");
        assert_rejected(&outcome, "UPDATE statements must include a WHERE clause");
    }

    #[test]
    fn test_where_not_required_by_policy() {
        assert!(permissive().validate("DELETE FROM users").is_accepted());
    }

    #[test]
    fn test_where_inside_literal_is_accepted() {
        let outcome = strict().validate("UPDATE t SET note = 'WHERE is it'");
        assert!(outcome.is_accepted());
    }

    // =========================================================================
    // SELECT rewriting
    // =========================================================================

    #[test]
    fn test_select_gets_limit() {
        let guard = SqlGuard::new(SecurityPolicy {
            max_select_rows: 50,
            ..Default::default()
        });
        let outcome = guard.validate("SELECT id FROM t WHERE id=1");
        assert!(outcome.is_accepted());
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Select));
        assert_eq!(
            outcome.executable_text(),
            Some("SELECT id FROM t WHERE id=1 LIMIT 50")
        );
    }

    #[test]
    fn test_select_existing_limit_unchanged() {
        let outcome = strict().validate("SELECT * FROM t LIMIT 5");
        assert_eq!(outcome.executable_text(), Some("SELECT * FROM t LIMIT 5"));
    }

    #[test]
    fn test_select_revalidation_is_stable() {
        let guard = strict();
        let first = guard.validate("SELECT * FROM t;");
        let text = first.executable_text().unwrap().to_string();
        let second = guard.validate(&text);
        assert_eq!(second.executable_text(), Some(text.as_str()));
    }

    #[test]
    fn test_non_select_is_trimmed_not_rewritten() {
        let outcome = strict().validate("   SHOW TABLES  ");
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Unknown));
        assert_eq!(outcome.executable_text(), Some("SHOW TABLES"));
    }

    #[test]
    fn test_free_function_matches_guard() {
        let policy = SecurityPolicy::default();
        assert_eq!(
            validate("DELETE FROM users", &policy),
            SqlGuard::new(policy).validate("DELETE FROM users")
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = strict().validate("DELETE FROM users");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["accepted"], false);
        assert_eq!(json["statement_kind"], "DELETE");
        assert!(json.get("executable_text").is_none());
    }
}
