//! Positional parameter binding.
//!
//! Each binder has the `(query, param) -> query` shape so a parameter list can
//! be folded onto a query in order.

use crate::models::QueryParam;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;
type PgQuery<'q> = Query<'q, Postgres, PgArguments>;
type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Generates a binder for one backend. Only JSON differs between them.
macro_rules! param_binder {
    ($name:ident, $query:ident, json => |$value:ident| $json:expr) => {
        pub(crate) fn $name<'q>(query: $query<'q>, param: &'q QueryParam) -> $query<'q> {
            match param {
                QueryParam::Null => query.bind(None::<String>),
                QueryParam::Bool(b) => query.bind(*b),
                QueryParam::Int(i) => query.bind(*i),
                QueryParam::Float(f) => query.bind(*f),
                QueryParam::String(s) => query.bind(s.as_str()),
                QueryParam::Json($value) => query.bind($json),
            }
        }
    };
}

param_binder!(bind_mysql_param, MySqlQuery, json => |value| Json(value));
param_binder!(bind_postgres_param, PgQuery, json => |value| Json(value));
// No native JSON type, bound as text
param_binder!(bind_sqlite_param, SqliteQuery, json => |value| value.to_string());
