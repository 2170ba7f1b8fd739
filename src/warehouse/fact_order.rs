//! `fact_order`: one row per staged order with item count and subtotal.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::info;

use crate::error::Result;
use crate::storage::WarehouseTable;

use super::records::{FactOrderRow, StagingOrder, StagingOrderItem};
use super::{BuildOutcome, Warehouse};

/// Per-order item aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ItemAggregate {
    pub num_items: i64,
    pub items_subtotal: Decimal,
}

/// Group items by order: count of item ids and sum of prices.
pub(crate) fn aggregate_items(items: &[StagingOrderItem]) -> HashMap<&str, ItemAggregate> {
    let mut aggregates: HashMap<&str, ItemAggregate> = HashMap::new();
    for item in items {
        let entry = aggregates.entry(item.order_id.as_str()).or_default();
        if item.order_item_id.is_some() {
            entry.num_items += 1;
        }
        entry.items_subtotal += item.price;
    }
    aggregates
}

/// Left-join orders with their item aggregates.
///
/// Orders without items get zero items and a zero subtotal. Revenue is the
/// item subtotal; freight is not included.
pub(crate) fn build_fact_rows(
    orders: Vec<StagingOrder>,
    items: &[StagingOrderItem],
) -> Vec<FactOrderRow> {
    let aggregates = aggregate_items(items);

    orders
        .into_iter()
        .map(|order| {
            let agg = aggregates
                .get(order.order_id.as_str())
                .copied()
                .unwrap_or_default();
            FactOrderRow {
                order_date: order.purchased_at.map(|ts| ts.date()),
                delivered_date: order.delivered_at.map(|ts| ts.date()),
                order_id: order.order_id,
                customer_id: order.customer_id,
                order_status: order.order_status,
                num_items: agg.num_items,
                items_subtotal: agg.items_subtotal,
                order_revenue: agg.items_subtotal,
            }
        })
        .collect()
}

impl Warehouse {
    /// Build `fact_order` from `stg_orders` and `stg_order_items`.
    pub async fn build_fact_orders(&self) -> Result<BuildOutcome> {
        let orders: Vec<StagingOrder> = self.fetch(WarehouseTable::StgOrders).await?;
        let items: Vec<StagingOrderItem> = self.fetch(WarehouseTable::StgOrderItems).await?;

        info!(
            orders = orders.len(),
            items = items.len(),
            "Building fact_order"
        );

        let rows = build_fact_rows(orders, &items);
        let written = self.write(WarehouseTable::FactOrder, rows).await?;
        Ok(BuildOutcome::Written(written))
    }
}
