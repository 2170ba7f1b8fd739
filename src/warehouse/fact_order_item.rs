//! `fact_order_item`: staged order lines whose parent order exists.

use std::collections::HashSet;

use tracing::warn;

use crate::error::Result;
use crate::storage::WarehouseTable;

use super::records::{FactOrderItemRow, OrderKey, StagingOrderItem};
use super::{skipped, BuildOutcome, SkipReason, Warehouse};

/// Outcome of the order-item build plus how many orphans were discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactOrderItemReport {
    pub outcome: BuildOutcome,
    pub orphans_dropped: usize,
}

impl FactOrderItemReport {
    fn skipped(reason: SkipReason, orphans_dropped: usize) -> Self {
        Self {
            outcome: skipped(WarehouseTable::FactOrderItem, reason),
            orphans_dropped,
        }
    }
}

/// Inner-join items to the parent key set. Returns survivors and orphan count.
pub(crate) fn drop_orphans(
    items: Vec<StagingOrderItem>,
    parents: &HashSet<String>,
) -> (Vec<FactOrderItemRow>, usize) {
    let staged = items.len();
    let kept: Vec<FactOrderItemRow> = items
        .into_iter()
        .filter(|item| parents.contains(&item.order_id))
        .map(FactOrderItemRow::from)
        .collect();
    let dropped = staged - kept.len();
    (kept, dropped)
}

impl Warehouse {
    /// Build `fact_order_item` from `stg_order_items`, keeping only lines
    /// whose order is already in `fact_order`.
    ///
    /// Must run after [`Warehouse::build_fact_orders`].
    pub async fn build_fact_order_items(&self) -> Result<FactOrderItemReport> {
        let items: Vec<StagingOrderItem> = self.fetch(WarehouseTable::StgOrderItems).await?;
        if items.is_empty() {
            return Ok(FactOrderItemReport::skipped(SkipReason::NoStagingItems, 0));
        }

        let parents: Vec<OrderKey> = self.fetch(WarehouseTable::FactOrder).await?;
        if parents.is_empty() {
            return Ok(FactOrderItemReport::skipped(SkipReason::NoParentOrders, 0));
        }
        let parents: HashSet<String> = parents.into_iter().map(|k| k.order_id).collect();

        let (rows, orphans_dropped) = drop_orphans(items, &parents);
        if orphans_dropped > 0 {
            warn!(
                table = %WarehouseTable::FactOrderItem,
                orphans_dropped,
                "Dropping order lines without a parent order"
            );
        }

        if rows.is_empty() {
            return Ok(FactOrderItemReport::skipped(
                SkipReason::NoSurvivingItems,
                orphans_dropped,
            ));
        }

        let written = self.write(WarehouseTable::FactOrderItem, rows).await?;
        Ok(FactOrderItemReport {
            outcome: BuildOutcome::Written(written),
            orphans_dropped,
        })
    }
}
