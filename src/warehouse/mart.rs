//! `final_orders`: order facts flattened with customer attributes.

use std::collections::HashMap;

use crate::error::Result;
use crate::storage::WarehouseTable;

use super::records::{DimCustomerRow, FactOrderRow, FinalOrderRow};
use super::{skipped, BuildOutcome, SkipReason, Warehouse};

/// Left-join facts with the dimension on `customer_id`.
///
/// Facts whose customer has no dimension row keep their own columns and
/// carry no customer attributes.
pub(crate) fn build_mart_rows(
    facts: Vec<FactOrderRow>,
    customers: &HashMap<String, DimCustomerRow>,
) -> Vec<FinalOrderRow> {
    facts
        .into_iter()
        .map(|fact| {
            let dim = fact
                .customer_id
                .as_deref()
                .and_then(|id| customers.get(id));
            FinalOrderRow {
                order_id: fact.order_id,
                order_date: fact.order_date,
                order_status: fact.order_status,
                num_items: fact.num_items,
                items_subtotal: fact.items_subtotal,
                order_revenue: fact.order_revenue,
                delivered_date: fact.delivered_date,
                customer_id: fact.customer_id,
                customer_unique_id: dim.and_then(|d| d.customer_unique_id.clone()),
                customer_city: dim.and_then(|d| d.city.clone()),
                customer_state: dim.and_then(|d| d.state.clone()),
                first_order_date: dim.and_then(|d| d.first_order_date),
                last_order_date: dim.and_then(|d| d.last_order_date),
                total_orders: dim.map(|d| d.total_orders),
                total_revenue: dim.map(|d| d.total_revenue),
            }
        })
        .collect()
}

impl Warehouse {
    /// Build `final_orders` from `fact_order` and `dim_customer`.
    pub async fn build_orders_mart(&self) -> Result<BuildOutcome> {
        let facts: Vec<FactOrderRow> = self.fetch(WarehouseTable::FactOrder).await?;
        if facts.is_empty() {
            return Ok(skipped(WarehouseTable::FinalOrders, SkipReason::NoFactOrders));
        }

        let customers: HashMap<String, DimCustomerRow> = self
            .fetch::<DimCustomerRow>(WarehouseTable::DimCustomer)
            .await?
            .into_iter()
            .map(|row| (row.customer_id.clone(), row))
            .collect();

        let rows = build_mart_rows(facts, &customers);
        let written = self.write(WarehouseTable::FinalOrders, rows).await?;
        Ok(BuildOutcome::Written(written))
    }
}
