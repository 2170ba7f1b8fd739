//! ecom-warehouse: one full warehouse refresh
//!
//! Checks for the raw extracts, reloads staging, rebuilds the dimension,
//! facts and mart, then validates the mart.
//!
//! ## Configuration
//! - ECOM_CONFIG: Path to YAML config (default: config.yaml)
//! - STORAGE_PATH: SQLite database path, or `:memory:`
//! - ECOM_DATA_DIR: Directory holding the raw CSV extracts
//! - ECOM_BATCH_SIZE: Rows per INSERT statement
//! - ECOM_LOG / ECOM_LOG_FORMAT: Log filter and `pretty`/`json` output
//!
//! Exits non-zero when any task fails. Missing raw files are not a failure.

use tracing::{info, warn};

use ecom_warehouse::config::Config;
use ecom_warehouse::pipeline::Pipeline;
use ecom_warehouse::storage::init_store;
use ecom_warehouse::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(config.log_format);

    info!(
        storage = %config.storage.path,
        data_dir = %config.data_dir.display(),
        batch_size = config.batch_size,
        "ecom-warehouse starting"
    );

    let store = init_store(&config.storage).await?;
    let report = Pipeline::new(store, config).run().await?;

    if report.is_stopped() {
        warn!(missing = ?report.missing_files, "Run stopped before loading");
    } else {
        info!(tasks = report.tasks.len(), "Warehouse refresh complete");
    }

    Ok(())
}
