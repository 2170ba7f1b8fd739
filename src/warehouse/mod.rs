//! Transform-and-load engine.
//!
//! Builds the star schema (`dim_customer`, `fact_order`, `fact_order_item`)
//! and the `final_orders` mart from staging tables, then validates the mart.
//!
//! Every builder recomputes a full snapshot from its inputs and upserts it,
//! so running a builder twice over unchanged staging data is a no-op on the
//! warehouse state. Builders must run in dependency order: the dimension
//! before order facts, order facts before order-item facts, and both before
//! the mart.

use std::fmt;
use std::sync::Arc;

use sea_query::{Alias, Query};
use tracing::info;

use crate::error::Result;
use crate::storage::{Store, WarehouseTable};

pub mod align;
mod dim_customer;
mod fact_order;
mod fact_order_item;
mod mart;
pub mod records;
pub mod upsert;
mod validate;

pub use align::align_to_table;
pub use fact_order_item::FactOrderItemReport;
pub use upsert::{upsert_table, DEFAULT_BATCH_SIZE};

use records::{decode, DecodeRow, EncodeRow};

/// Why a builder wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `stg_customers` is empty.
    NoStagingCustomers,
    /// `stg_order_items` is empty.
    NoStagingItems,
    /// `fact_order` is empty, so order lines have no parent keys.
    NoParentOrders,
    /// Every staged order line was an orphan.
    NoSurvivingItems,
    /// `fact_order` is empty, so there is nothing to report.
    NoFactOrders,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NoStagingCustomers => "no customers in staging",
            SkipReason::NoStagingItems => "no items found in staging",
            SkipReason::NoParentOrders => "fact_order is empty, missing parent keys",
            SkipReason::NoSurvivingItems => "no valid rows left after filtering",
            SkipReason::NoFactOrders => "fact_order is empty",
        };
        f.write_str(reason)
    }
}

/// Result of one builder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Rows submitted to the upsert.
    Written(usize),
    Skipped(SkipReason),
}

/// Log a skipped build for `table`.
pub(crate) fn skipped(table: WarehouseTable, reason: SkipReason) -> BuildOutcome {
    info!(table = %table, %reason, "Skipping build");
    BuildOutcome::Skipped(reason)
}

/// Builders and validator bound to one store.
pub struct Warehouse {
    store: Arc<dyn Store>,
    batch_size: usize,
}

impl Warehouse {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per INSERT statement when upserting.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Read `R::COLUMNS` from every row of `table`.
    async fn fetch<R: DecodeRow>(&self, table: WarehouseTable) -> Result<Vec<R>> {
        let select = Query::select()
            .columns(R::COLUMNS.iter().map(|c| Alias::new(*c)))
            .from(Alias::new(table.name()))
            .to_owned();
        let sql = self.store.build_select(select);
        let rs = self.store.query(&sql).await?;
        decode(table.name(), &rs)
    }

    /// Align and upsert `records` into `table`.
    async fn write<R: EncodeRow>(&self, table: WarehouseTable, records: Vec<R>) -> Result<usize> {
        upsert_table(
            self.store.as_ref(),
            table.name(),
            records::encode(records),
            self.batch_size,
        )
        .await
    }
}
