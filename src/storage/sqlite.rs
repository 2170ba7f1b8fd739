//! SQLite implementation of the store interface.

use std::str::FromStr;

use async_trait::async_trait;
use sea_query::{
    DeleteStatement, IndexCreateStatement, InsertStatement, SelectStatement, SqliteQueryBuilder,
    TableCreateStatement,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, SqliteConnection, SqlitePool, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::Result;
use crate::storage::{Store, TableSchema};
use crate::value::{ResultSet, Value};

const MEMORY_PATH: &str = ":memory:";

/// SQLite implementation of Store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn is_memory(path: &str) -> bool {
        path == MEMORY_PATH || path == "sqlite::memory:"
    }

    /// Open (creating if missing) the database at `path`.
    ///
    /// `:memory:` opens a private in-memory database. The pool is pinned to a
    /// single long-lived connection so every call sees the same database.
    pub async fn connect(path: &str) -> Result<Self> {
        let pool = if Self::is_memory(path) {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePoolOptions::new().connect_with(options).await?
        };

        Ok(Self { pool })
    }

    /// In-memory store for tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(MEMORY_PATH).await
    }

    /// Run statements on an already-started transaction.
    async fn execute_all(conn: &mut SqliteConnection, statements: &[String]) -> Result<u64> {
        let mut affected = 0;
        for sql in statements {
            let result = sqlx::query(sql).persistent(false).execute(&mut *conn).await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    fn decode_row(row: &SqliteRow) -> Result<Vec<Value>> {
        (0..row.len()).map(|idx| Self::decode_value(row, idx)).collect()
    }

    /// Decode by the value's runtime storage class, not the declared column type.
    fn decode_value(row: &SqliteRow, idx: usize) -> Result<Value> {
        let storage_class = {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            raw.type_info().name().to_ascii_uppercase()
        };

        let value = match storage_class.as_str() {
            "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(idx)?),
            "REAL" | "NUMERIC" => Value::Real(row.try_get_unchecked::<f64, _>(idx)?),
            "BLOB" => {
                let bytes: Vec<u8> = row.try_get_unchecked(idx)?;
                Value::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => Value::Text(row.try_get_unchecked::<String, _>(idx)?),
        };
        Ok(value)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => {
                let described = (&self.pool).describe(sql).await?;
                described.columns().iter().map(|c| c.name().to_string()).collect()
            }
        };

        let mut result = ResultSet::new(columns);
        for row in &rows {
            result.push_row(Self::decode_row(row)?);
        }

        debug!(rows = result.len(), "Query complete");
        Ok(result)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<u64> {
        if statements.is_empty() {
            return Ok(0);
        }

        // BEGIN IMMEDIATE takes the write lock upfront so the batch cannot
        // deadlock upgrading from a shared lock.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::execute_all(&mut conn, statements).await;

        match result {
            Ok(affected) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(affected)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let rows = sqlx::query("SELECT name, pk FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut keyed: Vec<(i64, String)> = Vec::new();
        for row in &rows {
            let name: String = row.try_get("name")?;
            let pk: i64 = row.try_get("pk")?;
            if pk > 0 {
                keyed.push((pk, name.clone()));
            }
            columns.push(name);
        }
        // pk is the 1-based position within the key, not the column order
        keyed.sort_by_key(|(pk, _)| *pk);

        Ok(TableSchema {
            columns,
            primary_key: keyed.into_iter().map(|(_, name)| name).collect(),
        })
    }

    fn build_select(&self, stmt: SelectStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn build_insert(&self, stmt: InsertStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn build_delete(&self, stmt: DeleteStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn build_table_create(&self, stmt: TableCreateStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn build_index_create(&self, stmt: IndexCreateStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }
}
