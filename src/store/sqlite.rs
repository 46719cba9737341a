use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::debug;

use super::sql::{build_delete_sql, build_select_sql, build_update_sql, quote_ident};
use super::{OrderBy, Predicate, Row, RowStore, Value};
use crate::{AppError, AppResult};

/// [`RowStore`] backed by a single rusqlite connection.
pub struct SqliteStore {
    conn: Connection,
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Text(v.to_string()),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

impl SqliteStore {
    /// Opens an existing database file read-write. The file is never created.
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "open_database")
                .with_context("path", path.display().to_string())
        })?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))
            .map_err(|err| AppError::from(err).with_context("operation", "busy_timeout"))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|err| AppError::from(err).with_context("operation", "open_in_memory"))?;
        Ok(Self { conn })
    }

    pub fn execute_batch(&self, sql: &str) -> AppResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|err| AppError::from(err).with_context("operation", "execute_batch"))
    }

    fn query_rows(
        &self,
        table: &str,
        columns: &[&str],
        sql: &str,
        params: &[Value],
    ) -> AppResult<Vec<Row>> {
        debug!(target: "dbmend", table, statement = sql, "select");
        let mut stmt = self.conn.prepare(sql).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "prepare_select")
                .with_context("table", table.to_string())
        })?;
        let names: Vec<String> = if columns.is_empty() {
            stmt.column_names().iter().map(|s| s.to_string()).collect()
        } else {
            columns.iter().map(|s| s.to_string()).collect()
        };
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql_value)))
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "query_select")
                    .with_context("table", table.to_string())
            })?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|err| {
            AppError::from(err)
                .with_context("operation", "select_iter")
                .with_context("table", table.to_string())
        })? {
            let mut record = Row::new();
            for (idx, name) in names.iter().enumerate() {
                let value = row.get_ref(idx).map_err(|err| {
                    AppError::from(err)
                        .with_context("operation", "read_value")
                        .with_context("column", name.clone())
                })?;
                record.set(name.clone(), from_value_ref(value));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn execute(&self, operation: &str, table: &str, sql: &str, params: &[Value]) -> AppResult<usize> {
        debug!(target: "dbmend", table, statement = sql, operation, "execute");
        self.conn
            .execute(sql, params_from_iter(params.iter().map(to_sql_value)))
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", operation.to_string())
                    .with_context("table", table.to_string())
            })
    }
}

impl RowStore for SqliteStore {
    fn select_one(
        &self,
        table: &str,
        columns: &[&str],
        predicate: &Predicate,
    ) -> AppResult<Option<Row>> {
        let (sql, params) = build_select_sql(table, columns, predicate, &[], Some(1));
        Ok(self.query_rows(table, columns, &sql, &params)?.into_iter().next())
    }

    fn select_many(
        &self,
        table: &str,
        columns: &[&str],
        predicate: &Predicate,
        order_by: &[OrderBy],
    ) -> AppResult<Vec<Row>> {
        let (sql, params) = build_select_sql(table, columns, predicate, order_by, None);
        self.query_rows(table, columns, &sql, &params)
    }

    fn update(&self, table: &str, uid: i64, values: &[(String, Value)]) -> AppResult<usize> {
        let (sql, params) = build_update_sql(table, uid, values);
        self.execute("update", table, &sql, &params)
    }

    fn delete(&self, table: &str, uid: i64) -> AppResult<usize> {
        let (sql, params) = build_delete_sql(table, uid);
        self.execute("delete", table, &sql, &params)
    }

    fn table_exists(&self, table: &str) -> AppResult<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "table_exists")
                    .with_context("table", table.to_string())
            })?;
        Ok(count > 0)
    }

    fn field_exists(&self, table: &str, field: &str) -> AppResult<bool> {
        if !self.table_exists(table)? {
            return Ok(false);
        }
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "table_info")
                    .with_context("table", table.to_string())
            })?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|err| AppError::from(err).with_context("operation", "table_info_query"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| AppError::from(err).with_context("operation", "collect_columns"))?;
        Ok(names.iter().any(|name| name == field))
    }
}
