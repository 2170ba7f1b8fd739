//! Schema alignment of computed result sets against live table columns.

use tracing::debug;

use crate::error::{EltError, Result};
use crate::storage::Store;
use crate::value::ResultSet;

/// Project `rs` onto the live column list of `table`, in table order.
///
/// Result columns the table lacks are dropped. Table columns the result lacks
/// are a [`EltError::SchemaMismatch`]; nothing is written in that case.
pub async fn align_to_table(store: &dyn Store, table: &str, rs: &ResultSet) -> Result<ResultSet> {
    let table_columns = store.introspect_columns(table).await?;
    align_to_live_columns(table, &table_columns, rs)
}

/// Alignment against a column list just read from the store. An empty list
/// means the table does not exist.
pub(crate) fn align_to_live_columns(
    table: &str,
    table_columns: &[String],
    rs: &ResultSet,
) -> Result<ResultSet> {
    if table_columns.is_empty() {
        return Err(EltError::EmptySchema {
            table: table.to_string(),
        });
    }
    align_columns(table, table_columns, rs)
}

/// Alignment against an already-fetched column list.
pub fn align_columns(table: &str, table_columns: &[String], rs: &ResultSet) -> Result<ResultSet> {
    let (available, missing): (Vec<String>, Vec<String>) = table_columns
        .iter()
        .cloned()
        .partition(|c| rs.column_index(c).is_some());

    if !missing.is_empty() {
        return Err(EltError::SchemaMismatch {
            table: table.to_string(),
            missing,
            available: rs.columns().to_vec(),
        });
    }

    let dropped = rs.columns().len() - available.len();
    if dropped > 0 {
        debug!(table, dropped, "Dropping columns absent from table");
    }

    Ok(rs.project(&available))
}
