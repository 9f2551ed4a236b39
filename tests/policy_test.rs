//! Safety gate behavior across policies.

use rand::Rng;
use rand::seq::SliceRandom;
use sql_gate_mcp::tools::guard::{SecurityPolicy, SqlGuard, validate};
use sql_gate_mcp::tools::StatementKind;

const TABLES: &[&str] = &["users", "orders", "t", "audit_log", "\"Quoted Table\""];
const COLUMNS: &[&str] = &["id", "name", "created_at", "COUNT(*)", "*"];
const FILTERS: &[&str] = &[
    "",
    " WHERE id = 1",
    " where name = 'bob'",
    " WHERE created_at > '2024-01-01' ORDER BY id",
    " GROUP BY name",
];

fn policy(max_select_rows: u32) -> SecurityPolicy {
    SecurityPolicy {
        max_select_rows,
        ..SecurityPolicy::default()
    }
}

fn random_select(rng: &mut impl Rng) -> String {
    let column = COLUMNS.choose(rng).unwrap();
    let table = TABLES.choose(rng).unwrap();
    let filter = FILTERS.choose(rng).unwrap();
    let keyword = ["SELECT", "select", "Select"].choose(rng).unwrap();
    let trailing = ["", ";", "  ", " ;"].choose(rng).unwrap();
    format!("{} {} FROM {}{}{}", keyword, column, table, filter, trailing)
}

fn limit_count(sql: &str) -> usize {
    sql.to_uppercase().matches("LIMIT").count()
}

#[test]
fn test_select_without_limit_gets_exactly_one() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let max_rows = rng.gen_range(1..=100_000);
        let sql = random_select(&mut rng);
        let outcome = validate(&sql, &policy(max_rows));

        assert!(outcome.is_accepted(), "{} was rejected", sql);
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Select));
        let text = outcome.executable_text().unwrap();
        assert!(
            text.ends_with(&format!("LIMIT {}", max_rows)),
            "{} -> {}",
            sql,
            text
        );
        assert_eq!(limit_count(text), 1, "{}", text);
    }
}

#[test]
fn test_existing_limit_is_left_alone() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let base = random_select(&mut rng);
        let base = base.trim().trim_end_matches(';').trim_end();
        let keyword = ["LIMIT", "limit", "Limit"].choose(&mut rng).unwrap();
        let sql = format!("{} {} {}", base, keyword, rng.gen_range(1..500));

        let outcome = validate(&sql, &policy(10));
        assert!(outcome.is_accepted());
        assert_eq!(outcome.executable_text(), Some(sql.as_str()));
        assert_eq!(limit_count(&sql), 1);
    }
}

#[test]
fn test_revalidating_executable_text_is_stable() {
    let mut rng = rand::thread_rng();
    let guard = SqlGuard::new(policy(25));
    for _ in 0..200 {
        let sql = random_select(&mut rng);
        let first = guard.validate(&sql);
        let text = first.executable_text().unwrap();
        let second = guard.validate(text);
        assert_eq!(second.executable_text(), Some(text));
    }

    let outcome = guard.validate("SELECT * FROM t LIMIT 5");
    assert_eq!(outcome.executable_text(), Some("SELECT * FROM t LIMIT 5"));
}

#[test]
fn test_update_delete_without_where() {
    let statements = [
        ("DELETE FROM users", StatementKind::Delete),
        ("delete from audit_log;", StatementKind::Delete),
        ("UPDATE users SET active = false", StatementKind::Update),
        ("  update orders set total = 0  ", StatementKind::Update),
    ];
    let relaxed = SecurityPolicy {
        require_where_clause: false,
        ..SecurityPolicy::default()
    };

    for (sql, kind) in statements {
        let outcome = validate(sql, &SecurityPolicy::default());
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.statement_kind(), Some(kind));
        let reason = outcome.rejection_reason().unwrap();
        assert!(reason.contains(kind.as_str()), "{}", reason);
        assert!(reason.contains("WHERE clause"), "{}", reason);

        let outcome = validate(sql, &relaxed);
        assert!(outcome.is_accepted(), "{} should pass without the WHERE rule", sql);
        assert_eq!(outcome.executable_text(), Some(sql.trim()));
    }
}

#[test]
fn test_multiple_statements_flip_with_flag() {
    let statements = [
        "SELECT 1; SELECT 2",
        "INSERT INTO t VALUES (1);DELETE FROM t WHERE id = 1",
        "UPDATE t SET a = 'x;y' WHERE id = 1; DROP TABLE t",
        "SELECT 1;\n\tSELECT 2;",
    ];
    let allowed = SecurityPolicy {
        allow_multiple_statements: true,
        allow_ddl: true,
        ..SecurityPolicy::default()
    };

    for sql in statements {
        let outcome = validate(sql, &SecurityPolicy::default());
        assert!(!outcome.is_accepted());
        assert!(outcome.statement_kind().is_none());
        assert!(
            outcome
                .rejection_reason()
                .unwrap()
                .contains("Multiple statements")
        );

        assert!(validate(sql, &allowed).is_accepted(), "{}", sql);
    }
}

#[test]
fn test_semicolons_inside_literals_are_not_separators() {
    let statements = [
        "SELECT 'a;b' FROM t",
        "SELECT \"col;name\" FROM t",
        "INSERT INTO t VALUES ('it\\'s; fine')",
        "SELECT 1;   ",
    ];
    for sql in statements {
        let outcome = validate(sql, &SecurityPolicy::default());
        assert!(outcome.is_accepted(), "{} -> {:?}", sql, outcome);
    }
}

#[test]
fn test_ddl_flips_with_flag() {
    let statements = [
        "CREATE TABLE t (id INT)",
        "drop table t",
        "ALTER TABLE t ADD COLUMN x INT",
        "TRUNCATE t",
        "RENAME TABLE a TO b",
    ];
    let allowed = SecurityPolicy {
        allow_ddl: true,
        ..SecurityPolicy::default()
    };

    for sql in statements {
        let outcome = validate(sql, &SecurityPolicy::default());
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Ddl));
        let reason = outcome.rejection_reason().unwrap();
        assert!(reason.contains("DDL"));
        for keyword in ["CREATE", "DROP", "ALTER", "TRUNCATE", "RENAME"] {
            assert!(reason.contains(keyword));
        }

        let outcome = validate(sql, &allowed);
        assert!(outcome.is_accepted());
        assert_eq!(outcome.executable_text(), Some(sql));
    }
}

#[test]
fn test_rejection_order_is_fixed() {
    // Multi-statement wins over DDL and WHERE checks
    let outcome = validate("DROP TABLE a; DELETE FROM b", &SecurityPolicy::default());
    assert!(outcome.rejection_reason().unwrap().contains("Multiple statements"));

    // Empty wins over everything
    let outcome = validate("   \n\t ", &SecurityPolicy::default());
    assert_eq!(outcome.rejection_reason(), Some("Query cannot be empty"));
    assert!(outcome.statement_kind().is_none());
}

#[test]
fn test_delete_example() {
    let outcome = validate(
        "DELETE FROM users",
        &SecurityPolicy {
            max_select_rows: 1000,
            allow_ddl: false,
            allow_multiple_statements: false,
            require_where_clause: true,
        },
    );
    assert!(!outcome.is_accepted());
    assert_eq!(outcome.statement_kind(), Some(StatementKind::Delete));
    assert!(outcome.rejection_reason().unwrap().contains("WHERE clause"));
}

#[test]
fn test_select_example() {
    let outcome = validate("SELECT id FROM t WHERE id=1", &policy(50));
    assert!(outcome.is_accepted());
    assert_eq!(outcome.statement_kind(), Some(StatementKind::Select));
    assert_eq!(
        outcome.executable_text(),
        Some("SELECT id FROM t WHERE id=1 LIMIT 50")
    );
}

#[test]
fn test_where_inside_literal_counts_as_where() {
    // Textual detection: a quoted WHERE satisfies the rule
    let outcome = validate(
        "UPDATE t SET note = 'WHERE is it'",
        &SecurityPolicy::default(),
    );
    assert!(outcome.is_accepted());
}

#[test]
fn test_unknown_statements_pass_unchanged() {
    for sql in ["SHOW TABLES", "PRAGMA table_info(t)", "WITH x AS (SELECT 1) SELECT * FROM x"] {
        let outcome = validate(sql, &SecurityPolicy::default());
        assert!(outcome.is_accepted());
        assert_eq!(outcome.statement_kind(), Some(StatementKind::Unknown));
        assert_eq!(outcome.executable_text(), Some(sql));
    }
}
