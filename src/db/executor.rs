//! Statement execution on a single checked-out connection.
//!
//! Row-returning statements are streamed and converted to JSON maps; others
//! report the affected row count. Statements without parameters go through the
//! driver's raw path so that SQL which cannot be prepared still runs.
//!
//! Each submodule provides the same interface adapted to its database type.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::types::RowToJson;
use crate::error::DriverError;
use crate::models::{QueryParam, StatementOutput};
use crate::tools::sql_validator::StatementKind;
use futures_util::TryStreamExt;

fn to_json_rows<R: RowToJson>(rows: Vec<R>) -> StatementOutput {
    StatementOutput::rows(rows.iter().map(RowToJson::to_json_map).collect())
}

fn statement_error(err: sqlx::Error, sql: &str) -> DriverError {
    DriverError::from(err).with_statement(sql)
}

pub(crate) mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlConnection, MySqlRow};
    use sqlx::{Executor, MySql};

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &str,
        kind: StatementKind,
        params: &[QueryParam],
    ) -> Result<StatementOutput, DriverError> {
        if kind.returns_rows() {
            let rows: Vec<MySqlRow> = if params.is_empty() {
                conn.fetch(sql).try_collect().await
            } else {
                let query = params
                    .iter()
                    .fold(sqlx::query::<MySql>(sql), bind_mysql_param);
                query.fetch(&mut *conn).try_collect().await
            }
            .map_err(|e| statement_error(e, sql))?;
            Ok(to_json_rows(rows))
        } else {
            let result = if params.is_empty() {
                conn.execute(sql).await
            } else {
                let query = params
                    .iter()
                    .fold(sqlx::query::<MySql>(sql), bind_mysql_param);
                query.execute(&mut *conn).await
            }
            .map_err(|e| statement_error(e, sql))?;
            Ok(StatementOutput::write(result.rows_affected()))
        }
    }
}

pub(crate) mod postgres {
    use super::*;
    use sqlx::postgres::{PgConnection, PgRow};
    use sqlx::{Executor, Postgres};

    pub async fn execute(
        conn: &mut PgConnection,
        sql: &str,
        kind: StatementKind,
        params: &[QueryParam],
    ) -> Result<StatementOutput, DriverError> {
        if kind.returns_rows() {
            let rows: Vec<PgRow> = if params.is_empty() {
                conn.fetch(sql).try_collect().await
            } else {
                let query = params
                    .iter()
                    .fold(sqlx::query::<Postgres>(sql), bind_postgres_param);
                query.fetch(&mut *conn).try_collect().await
            }
            .map_err(|e| statement_error(e, sql))?;
            Ok(to_json_rows(rows))
        } else {
            let result = if params.is_empty() {
                conn.execute(sql).await
            } else {
                let query = params
                    .iter()
                    .fold(sqlx::query::<Postgres>(sql), bind_postgres_param);
                query.execute(&mut *conn).await
            }
            .map_err(|e| statement_error(e, sql))?;
            Ok(StatementOutput::write(result.rows_affected()))
        }
    }
}

pub(crate) mod sqlite {
    use super::*;
    use sqlx::sqlite::{SqliteConnection, SqliteRow};
    use sqlx::{Executor, Sqlite};

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        kind: StatementKind,
        params: &[QueryParam],
    ) -> Result<StatementOutput, DriverError> {
        if kind.returns_rows() {
            let rows: Vec<SqliteRow> = if params.is_empty() {
                conn.fetch(sql).try_collect().await
            } else {
                let query = params
                    .iter()
                    .fold(sqlx::query::<Sqlite>(sql), bind_sqlite_param);
                query.fetch(&mut *conn).try_collect().await
            }
            .map_err(|e| statement_error(e, sql))?;
            Ok(to_json_rows(rows))
        } else {
            let result = if params.is_empty() {
                conn.execute(sql).await
            } else {
                let query = params
                    .iter()
                    .fold(sqlx::query::<Sqlite>(sql), bind_sqlite_param);
                query.execute(&mut *conn).await
            }
            .map_err(|e| statement_error(e, sql))?;
            Ok(StatementOutput::write(result.rows_affected()))
        }
    }
}
