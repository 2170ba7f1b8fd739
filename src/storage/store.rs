//! Store trait definition.

use async_trait::async_trait;
use sea_query::{DeleteStatement, IndexCreateStatement, InsertStatement, SelectStatement, TableCreateStatement};

use crate::error::Result;
use crate::value::ResultSet;

/// Live shape of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    /// Column names in table order.
    pub columns: Vec<String>,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
}

/// Queryable relational store the engine reads from and upserts into.
///
/// Every call is a single synchronous round-trip from the caller's point of
/// view. Errors are surfaced as returned by the driver; nothing is retried.
///
/// Implementations:
/// - `SqliteStore`: SQLite storage
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a read query and collect every row.
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Execute a single statement, returning rows affected.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute statements in one transaction.
    ///
    /// Commits only if every statement succeeds. On the first failure the
    /// transaction is rolled back and that error is returned.
    async fn execute_batch(&self, statements: &[String]) -> Result<u64>;

    /// Columns and primary key of `table`, read in one round-trip.
    ///
    /// A table that does not exist has an empty schema.
    async fn table_schema(&self, table: &str) -> Result<TableSchema>;

    /// Live, ordered column list of `table`.
    async fn introspect_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table_schema(table).await?.columns)
    }

    fn build_select(&self, stmt: SelectStatement) -> String;

    fn build_insert(&self, stmt: InsertStatement) -> String;

    fn build_delete(&self, stmt: DeleteStatement) -> String;

    fn build_table_create(&self, stmt: TableCreateStatement) -> String;

    fn build_index_create(&self, stmt: IndexCreateStatement) -> String;
}
