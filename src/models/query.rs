//! Query-related data models.
//!
//! This module defines statement parameters and the raw output a pooled
//! connection hands back after running a statement.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;

/// Maximum query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// A positional parameter for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

/// Raw result of one statement on a pooled connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatementOutput {
    /// Rows as column-name keyed maps. Empty for statements that return none.
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Set for statements that modify data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl StatementOutput {
    /// Output of a row-returning statement.
    pub fn rows(rows: Vec<serde_json::Map<String, JsonValue>>) -> Self {
        Self {
            rows,
            rows_affected: None,
        }
    }

    /// Output of a write statement (INSERT/UPDATE/DELETE/DDL).
    pub fn write(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected: Some(rows_affected),
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Clamp a requested timeout to the allowed range, falling back to `default`.
pub fn effective_timeout(requested: Option<u32>, default: u32) -> u32 {
    requested
        .unwrap_or(default)
        .clamp(1, MAX_QUERY_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_query_param_deserialize_untagged() {
        let params: Vec<QueryParam> =
            serde_json::from_str(r#"[null, true, 7, 1.5, "x", {"a": 1}]"#).unwrap();
        assert_eq!(params[0], QueryParam::Null);
        assert_eq!(params[1], QueryParam::Bool(true));
        assert_eq!(params[2], QueryParam::Int(7));
        assert_eq!(params[3], QueryParam::Float(1.5));
        assert_eq!(params[4], QueryParam::String("x".into()));
        assert_eq!(params[5].type_name(), "json");
    }

    #[test]
    fn test_statement_output_constructors() {
        let out = StatementOutput::write(3);
        assert_eq!(out.rows_affected, Some(3));
        assert_eq!(out.row_count(), 0);

        let out = StatementOutput::rows(vec![serde_json::Map::new()]);
        assert_eq!(out.rows_affected, None);
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn test_effective_timeout_bounds() {
        assert_eq!(effective_timeout(None, DEFAULT_QUERY_TIMEOUT_SECS), 30);
        assert_eq!(effective_timeout(Some(999), 30), MAX_QUERY_TIMEOUT_SECS);
        assert_eq!(effective_timeout(Some(0), 30), 1);
        assert_eq!(effective_timeout(Some(5), 30), 5);
    }
}
