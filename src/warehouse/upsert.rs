//! Idempotent insert-or-update writer.

use sea_query::{Alias, OnConflict, Query, SimpleExpr};
use tracing::info;

use crate::error::Result;
use crate::storage::Store;
use crate::value::ResultSet;

use super::align::align_to_live_columns;

/// Rows per INSERT statement unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Upsert `rs` into `table`.
///
/// The result set is aligned to the live table columns and null-like
/// sentinels are normalized to NULL. Rows are inserted in multi-row
/// statements; a key conflict overwrites every non-key column. All
/// statements run in one transaction. Returns the number of rows submitted;
/// an empty result set submits nothing and touches no table.
pub async fn upsert_table(
    store: &dyn Store,
    table: &str,
    rs: ResultSet,
    batch_size: usize,
) -> Result<usize> {
    if rs.is_empty() {
        info!(table, "No data to upsert, result set is empty");
        return Ok(0);
    }

    let schema = store.table_schema(table).await?;
    let aligned = align_to_live_columns(table, &schema.columns, &rs)?.normalized();
    let statements =
        build_upsert_statements(store, table, &aligned, &schema.primary_key, batch_size)?;

    store.execute_batch(&statements).await?;

    info!(table, rows = aligned.len(), "Upserted rows");
    Ok(aligned.len())
}

fn build_upsert_statements(
    store: &dyn Store,
    table: &str,
    aligned: &ResultSet,
    keys: &[String],
    batch_size: usize,
) -> Result<Vec<String>> {
    let columns = aligned.columns();
    let update_columns: Vec<Alias> = columns
        .iter()
        .filter(|c| !keys.contains(c))
        .map(|c| Alias::new(c.as_str()))
        .collect();

    let on_conflict = if keys.is_empty() {
        None
    } else {
        let mut clause = OnConflict::columns(keys.iter().map(|k| Alias::new(k.as_str())));
        if update_columns.is_empty() {
            clause.do_nothing();
        } else {
            clause.update_columns(update_columns);
        }
        Some(clause)
    };

    let mut statements = Vec::new();
    for chunk in aligned.rows().chunks(batch_size.max(1)) {
        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(table))
            .columns(columns.iter().map(|c| Alias::new(c.as_str())));

        for row in chunk {
            insert.values(
                row.iter()
                    .cloned()
                    .map(|v| SimpleExpr::Value(v.into())),
            )?;
        }

        if let Some(clause) = &on_conflict {
            insert.on_conflict(clause.clone());
        }

        statements.push(store.build_insert(insert));
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sea_query::{
        DeleteStatement, IndexCreateStatement, InsertStatement, SelectStatement,
        TableCreateStatement,
    };

    use crate::storage::{SqliteStore, TableSchema};
    use crate::value::Value;

    /// Counts schema reads and forwards everything to SQLite.
    struct CountingStore {
        inner: SqliteStore,
        schema_reads: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn query(&self, sql: &str) -> Result<ResultSet> {
            self.inner.query(sql).await
        }

        async fn execute(&self, sql: &str) -> Result<u64> {
            self.inner.execute(sql).await
        }

        async fn execute_batch(&self, statements: &[String]) -> Result<u64> {
            self.inner.execute_batch(statements).await
        }

        async fn table_schema(&self, table: &str) -> Result<TableSchema> {
            self.schema_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.table_schema(table).await
        }

        fn build_select(&self, stmt: SelectStatement) -> String {
            self.inner.build_select(stmt)
        }

        fn build_insert(&self, stmt: InsertStatement) -> String {
            self.inner.build_insert(stmt)
        }

        fn build_delete(&self, stmt: DeleteStatement) -> String {
            self.inner.build_delete(stmt)
        }

        fn build_table_create(&self, stmt: TableCreateStatement) -> String {
            self.inner.build_table_create(stmt)
        }

        fn build_index_create(&self, stmt: IndexCreateStatement) -> String {
            self.inner.build_index_create(stmt)
        }
    }

    async fn store_with_table() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .execute(
                "CREATE TABLE target (id TEXT PRIMARY KEY, name TEXT, \
                 amount DECIMAL(12,2))",
            )
            .await
            .unwrap();
        store
    }

    fn rows(data: &[(&str, &str, f64)]) -> ResultSet {
        ResultSet::with_rows(
            ["id", "name", "amount"],
            data.iter()
                .map(|(id, name, amount)| {
                    vec![Value::from(*id), Value::from(*name), Value::Real(*amount)]
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let store = SqliteStore::in_memory().await.unwrap();
        // No table exists: an empty upsert must not even introspect.
        let written = upsert_table(&store, "absent", ResultSet::new(["id"]), 10)
            .await
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_inserts_then_updates_in_place() {
        let store = store_with_table().await;

        let written = upsert_table(&store, "target", rows(&[("a", "first", 1.0), ("b", "b", 2.0)]), 10)
            .await
            .unwrap();
        assert_eq!(written, 2);

        upsert_table(&store, "target", rows(&[("a", "second", 3.5)]), 10)
            .await
            .unwrap();

        let rs = store
            .query("SELECT id, name, amount FROM target ORDER BY id")
            .await
            .unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows()[0][1], Value::from("second"));
        assert_eq!(rs.rows()[0][2].as_decimal(), Value::Real(3.5).as_decimal());
        assert_eq!(rs.rows()[1][1], Value::from("b"));
    }

    #[tokio::test]
    async fn test_idempotent_rerun() {
        let store = store_with_table().await;
        let input = rows(&[("a", "x", 1.25), ("b", "y", 2.5)]);

        upsert_table(&store, "target", input.clone(), 10).await.unwrap();
        let first = store.query("SELECT * FROM target ORDER BY id").await.unwrap();

        upsert_table(&store, "target", input, 10).await.unwrap();
        let second = store.query("SELECT * FROM target ORDER BY id").await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sentinels_become_null() {
        let store = store_with_table().await;
        let rs = ResultSet::with_rows(
            ["id", "name", "amount"],
            vec![vec![Value::from("a"), Value::from(""), Value::Real(f64::NAN)]],
        );

        upsert_table(&store, "target", rs, 10).await.unwrap();

        let stored = store.query("SELECT name, amount FROM target").await.unwrap();
        assert_eq!(stored.rows()[0], vec![Value::Null, Value::Null]);
    }

    #[tokio::test]
    async fn test_batches_span_multiple_statements() {
        let store = store_with_table().await;
        let data: Vec<(String, f64)> = (0..7).map(|i| (format!("id{}", i), i as f64)).collect();
        let rs = ResultSet::with_rows(
            ["id", "name", "amount"],
            data.iter()
                .map(|(id, amount)| vec![Value::from(id.as_str()), Value::Null, Value::Real(*amount)])
                .collect(),
        );

        let written = upsert_table(&store, "target", rs, 3).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(store.query("SELECT * FROM target").await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_schema_mismatch_writes_nothing() {
        let store = store_with_table().await;
        let rs = ResultSet::with_rows(["id", "name"], vec![vec![Value::from("a"), Value::from("n")]]);

        assert!(upsert_table(&store, "target", rs, 10).await.is_err());
        assert!(store.query("SELECT * FROM target").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_read_once_per_upsert() {
        let store = CountingStore {
            inner: store_with_table().await,
            schema_reads: AtomicUsize::new(0),
        };

        upsert_table(&store, "target", rows(&[("a", "x", 1.0), ("b", "y", 2.0)]), 1)
            .await
            .unwrap();

        assert_eq!(store.schema_reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.query("SELECT * FROM target").await.unwrap().len(), 2);
    }
}
