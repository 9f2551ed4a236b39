//! Lexical SQL inspection used by the safety gate.
//!
//! This module does not parse SQL. It looks at the leading keyword to assign a
//! coarse [`StatementKind`], scans for statement separators outside quoted
//! literals, and checks for the `WHERE` and `LIMIT` keywords on ASCII word
//! boundaries. Everything here is a pure function over the input text.
//!
//! The keyword checks are textual: a `WHERE` or `LIMIT` that only appears inside
//! a string literal still counts as present.

use lazy_regex::{Lazy, Regex, lazy_regex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Only ASCII letters, digits and `_` are word characters, so `caféWHERE`
// still ends a word before WHERE.
static WHERE_KEYWORD: Lazy<Regex> = lazy_regex!(r"(?:^|[^A-Za-z0-9_])WHERE(?:[^A-Za-z0-9_]|$)");
static LIMIT_KEYWORD: Lazy<Regex> = lazy_regex!(r"(?:^|[^A-Za-z0-9_])LIMIT(?:[^A-Za-z0-9_]|$)");

/// Coarse category of a SQL statement, decided by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// CREATE, DROP, ALTER, TRUNCATE, RENAME
    Ddl,
    Unknown,
}

impl StatementKind {
    /// Upper-case name used in rejection messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Ddl => "DDL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the statement is expected to produce a result set.
    ///
    /// UNKNOWN is treated as row-returning so that SHOW, PRAGMA, WITH and
    /// similar statements still hand their rows back.
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::Select | Self::Unknown)
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered keyword markers. The trailing space is part of the marker.
const KEYWORD_MARKERS: &[(&str, StatementKind)] = &[
    ("CREATE ", StatementKind::Ddl),
    ("DROP ", StatementKind::Ddl),
    ("ALTER ", StatementKind::Ddl),
    ("TRUNCATE ", StatementKind::Ddl),
    ("RENAME ", StatementKind::Ddl),
    ("SELECT ", StatementKind::Select),
    ("INSERT ", StatementKind::Insert),
    ("UPDATE ", StatementKind::Update),
    ("DELETE ", StatementKind::Delete),
];

/// Keywords that open or close a transaction from inside plain SQL.
const TRANSACTION_CONTROL_KEYWORDS: &[&str] = &[
    "BEGIN", "START", "COMMIT", "ROLLBACK", "SAVEPOINT", "RELEASE", "END", "ABORT",
];

/// Classify a statement by its leading keyword.
///
/// Never fails: anything that does not start with a known marker is
/// [`StatementKind::Unknown`].
///
/// # Examples
///
/// ```
/// use sql_gate_mcp::tools::sql_validator::{StatementKind, classify_statement};
///
/// assert_eq!(classify_statement("  select id from t"), StatementKind::Select);
/// assert_eq!(classify_statement("DROP TABLE t"), StatementKind::Ddl);
/// assert_eq!(classify_statement("SHOW TABLES"), StatementKind::Unknown);
/// ```
pub fn classify_statement(sql: &str) -> StatementKind {
    let upper = sql.trim().to_uppercase();
    KEYWORD_MARKERS
        .iter()
        .find(|(marker, _)| upper.starts_with(marker))
        .map(|(_, kind)| *kind)
        .unwrap_or(StatementKind::Unknown)
}

/// Byte offsets of every `;` that sits outside quotes.
///
/// Scans the text tracking single quotes, double quotes and backslash escapes.
/// A backslash consumes the next character whatever it is. A quote only toggles
/// when the other quote type is not open.
///
/// Comments and dollar-quoted strings are not understood.
fn statement_separators(sql: &str) -> Vec<usize> {
    let mut separators = Vec::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_pending = false;

    for (idx, ch) in sql.char_indices() {
        if escape_pending {
            escape_pending = false;
            continue;
        }

        match ch {
            '\\' => escape_pending = true,
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => separators.push(idx),
            _ => {}
        }
    }

    separators
}

/// Detect a statement separator followed by more content.
///
/// A `;` outside quotes counts only if non-whitespace text follows it, so a
/// single trailing semicolon is fine.
pub fn has_multiple_statements(sql: &str) -> bool {
    statement_separators(sql)
        .into_iter()
        .any(|idx| !sql[idx + 1..].trim().is_empty())
}

/// Split `sql` on top-level `;` into trimmed, non-empty statements.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    for idx in statement_separators(sql) {
        statements.push(&sql[start..idx]);
        start = idx + 1;
    }
    statements.push(&sql[start..]);

    statements
        .into_iter()
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Check for the `WHERE` keyword on a word boundary, case-insensitively.
///
/// Matches inside string literals too: `UPDATE t SET note = 'where'` reports
/// a WHERE clause.
pub fn has_where_clause(sql: &str) -> bool {
    WHERE_KEYWORD.is_match(&sql.to_uppercase())
}

/// Check for the `LIMIT` keyword on a word boundary, case-insensitively.
pub fn has_limit_clause(sql: &str) -> bool {
    LIMIT_KEYWORD.is_match(&sql.to_uppercase())
}

/// Append `LIMIT <max_rows>` to a query that has no LIMIT yet.
///
/// A query that already mentions LIMIT is returned unchanged, so an explicit
/// limit is never raised, lowered or duplicated. Otherwise the query is
/// trimmed, one trailing `;` is dropped and the limit is appended.
///
/// # Examples
///
/// ```
/// use sql_gate_mcp::tools::sql_validator::apply_row_limit;
///
/// assert_eq!(apply_row_limit("SELECT * FROM t;", 50), "SELECT * FROM t LIMIT 50");
/// assert_eq!(apply_row_limit("SELECT * FROM t limit 5", 50), "SELECT * FROM t limit 5");
/// ```
pub fn apply_row_limit(sql: &str, max_rows: u32) -> String {
    if has_limit_clause(sql) {
        return sql.to_string();
    }

    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    format!("{} LIMIT {}", body, max_rows)
}

/// Skip whitespace and leading `--` or `/* */` comments.
fn skip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            return sql;
        }
    }
}

/// Return the transaction-control keyword any statement in `sql` starts
/// with, if any.
///
/// Every `;`-separated statement is checked, so a batch such as
/// `INSERT ...; COMMIT` is caught when multiple statements are allowed.
/// Used by the execute tool to keep BEGIN/COMMIT/ROLLBACK out of plain SQL,
/// where they would desynchronize the transaction session.
pub fn transaction_control_keyword(sql: &str) -> Option<&'static str> {
    split_statements(sql)
        .into_iter()
        .find_map(leading_control_keyword)
}

fn leading_control_keyword(statement: &str) -> Option<&'static str> {
    let leading: String = skip_leading_comments(statement)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    TRANSACTION_CONTROL_KEYWORDS
        .iter()
        .find(|kw| **kw == leading)
        .copied()
}
