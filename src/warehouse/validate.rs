//! Data-quality gate over `final_orders`.

use rust_decimal::Decimal;
use tracing::{error, info};

use crate::error::{DataQualityFailure, Result};
use crate::storage::WarehouseTable;

use super::records::MartCheckRow;
use super::Warehouse;

/// First violated condition, checked in a fixed order.
pub(crate) fn check_mart(rows: &[MartCheckRow]) -> std::result::Result<(), DataQualityFailure> {
    if rows.is_empty() {
        return Err(DataQualityFailure::EmptyMart);
    }
    if rows.iter().any(|r| r.order_id.is_none()) {
        return Err(DataQualityFailure::NullOrderId);
    }
    if rows.iter().any(|r| r.customer_id.is_none()) {
        return Err(DataQualityFailure::NullCustomerId);
    }
    if rows.iter().any(|r| r.num_items.is_some_and(|n| n < 0)) {
        return Err(DataQualityFailure::NegativeNumItems);
    }
    if rows
        .iter()
        .any(|r| r.order_revenue.is_some_and(|v| v < Decimal::ZERO))
    {
        return Err(DataQualityFailure::NegativeOrderRevenue);
    }
    Ok(())
}

impl Warehouse {
    /// Fail with a [`DataQualityFailure`] unless `final_orders` is non-empty,
    /// fully keyed and free of negative counts or revenue.
    pub async fn validate_orders_mart(&self) -> Result<()> {
        let rows: Vec<MartCheckRow> = self.fetch(WarehouseTable::FinalOrders).await?;

        if let Err(failure) = check_mart(&rows) {
            error!(table = %WarehouseTable::FinalOrders, rows = rows.len(), %failure, "Data quality check failed");
            return Err(failure.into());
        }

        info!(table = %WarehouseTable::FinalOrders, rows = rows.len(), "Data quality checks passed");
        Ok(())
    }
}
