//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;
use crate::error::Result;

pub mod schema;
pub mod sqlite;
mod store;

pub use schema::WarehouseTable;
pub use sqlite::SqliteStore;
pub use store::{Store, TableSchema};

/// Initialize the store based on configuration.
///
/// File-backed databases get their parent directory created first.
pub async fn init_store(config: &StorageConfig) -> Result<Arc<dyn Store>> {
    info!("Storage: sqlite at {}", config.path);

    if !SqliteStore::is_memory(&config.path) {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let store = SqliteStore::connect(&config.path).await?;
    Ok(Arc::new(store))
}
