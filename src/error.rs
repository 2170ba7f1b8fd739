//! Error types for the transform-and-load engine.

/// Named data-quality conditions checked against the reporting mart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DataQualityFailure {
    #[error("Data quality failed: final_orders is empty.")]
    EmptyMart,

    #[error("Data quality failed: NULL order_id found.")]
    NullOrderId,

    #[error("Data quality failed: NULL customer_id found.")]
    NullCustomerId,

    #[error("Data quality failed: negative num_items found.")]
    NegativeNumItems,

    #[error("Data quality failed: negative order_revenue found.")]
    NegativeOrderRevenue,
}

/// Errors that abort a builder, loader or the validator.
#[derive(Debug, thiserror::Error)]
pub enum EltError {
    #[error("[{table}] Missing required columns in result set: {missing:?}. Available columns: {available:?}")]
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Table {table} has no columns (does it exist?)")]
    EmptySchema { table: String },

    #[error("Column {column} missing from {relation} result")]
    MissingColumn { relation: String, column: String },

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Query build error: {0}")]
    QueryBuild(#[from] sea_query::error::Error),

    #[error(transparent)]
    DataQuality(#[from] DataQualityFailure),

    #[error("CSV error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EltError>;
