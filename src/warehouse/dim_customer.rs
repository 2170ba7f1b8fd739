//! `dim_customer`: customer attributes plus order-history metrics.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::Result;
use crate::storage::WarehouseTable;

use super::records::{DimCustomerRow, ItemPrice, OrderPurchase, StagingCustomer};
use super::{skipped, BuildOutcome, SkipReason, Warehouse};

/// Order-history metrics for one customer.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CustomerMetrics {
    pub first_order_date: Option<NaiveDate>,
    pub last_order_date: Option<NaiveDate>,
    pub total_orders: i64,
    pub total_revenue: Decimal,
}

#[derive(Default)]
struct MetricsAccumulator<'a> {
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
    orders: HashSet<&'a str>,
    revenue: Decimal,
}

/// Sum item prices per order.
pub(crate) fn revenue_per_order(items: &[ItemPrice]) -> HashMap<&str, Decimal> {
    let mut revenue: HashMap<&str, Decimal> = HashMap::new();
    for item in items {
        *revenue.entry(item.order_id.as_str()).or_default() += item.price;
    }
    revenue
}

/// Aggregate orders by customer.
///
/// Orders without a customer id are not attributed to anyone. Each distinct
/// order contributes its revenue once; missing dates are ignored by min/max.
pub(crate) fn customer_metrics<'a>(
    orders: &'a [OrderPurchase],
    revenue: &HashMap<&str, Decimal>,
) -> HashMap<&'a str, CustomerMetrics> {
    let mut acc: HashMap<&str, MetricsAccumulator<'_>> = HashMap::new();

    for order in orders {
        let Some(customer_id) = order.customer_id.as_deref() else {
            continue;
        };
        let entry = acc.entry(customer_id).or_default();

        if let Some(date) = order.purchased_at.map(|ts| ts.date()) {
            entry.first = Some(entry.first.map_or(date, |d| d.min(date)));
            entry.last = Some(entry.last.map_or(date, |d| d.max(date)));
        }

        if entry.orders.insert(order.order_id.as_str()) {
            entry.revenue += revenue
                .get(order.order_id.as_str())
                .copied()
                .unwrap_or(Decimal::ZERO);
        }
    }

    acc.into_iter()
        .map(|(customer_id, a)| {
            (
                customer_id,
                CustomerMetrics {
                    first_order_date: a.first,
                    last_order_date: a.last,
                    total_orders: a.orders.len() as i64,
                    total_revenue: a.revenue,
                },
            )
        })
        .collect()
}

/// Left-join customers with their metrics. Customers without orders get
/// zero totals and no dates.
pub(crate) fn build_dim_rows(
    customers: Vec<StagingCustomer>,
    metrics: &HashMap<&str, CustomerMetrics>,
) -> Vec<DimCustomerRow> {
    customers
        .into_iter()
        .map(|customer| {
            let m = metrics
                .get(customer.customer_id.as_str())
                .cloned()
                .unwrap_or_default();
            DimCustomerRow {
                customer_id: customer.customer_id,
                customer_unique_id: customer.customer_unique_id,
                city: customer.city,
                state: customer.state,
                first_order_date: m.first_order_date,
                last_order_date: m.last_order_date,
                total_orders: m.total_orders,
                total_revenue: m.total_revenue,
            }
        })
        .collect()
}

impl Warehouse {
    /// Build `dim_customer` from `stg_customers`, `stg_orders` and
    /// `stg_order_items`.
    pub async fn build_dim_customer(&self) -> Result<BuildOutcome> {
        let customers: Vec<StagingCustomer> = self.fetch(WarehouseTable::StgCustomers).await?;
        if customers.is_empty() {
            return Ok(skipped(
                WarehouseTable::DimCustomer,
                SkipReason::NoStagingCustomers,
            ));
        }

        let orders: Vec<OrderPurchase> = self.fetch(WarehouseTable::StgOrders).await?;
        if orders.is_empty() {
            info!(
                table = %WarehouseTable::DimCustomer,
                customers = customers.len(),
                "No staged orders, loading customers with zero metrics"
            );
            let rows = build_dim_rows(customers, &HashMap::new());
            let written = self.write(WarehouseTable::DimCustomer, rows).await?;
            return Ok(BuildOutcome::Written(written));
        }

        let items: Vec<ItemPrice> = self.fetch(WarehouseTable::StgOrderItems).await?;
        let revenue = revenue_per_order(&items);
        let metrics = customer_metrics(&orders, &revenue);

        info!(
            customers = customers.len(),
            customers_with_orders = metrics.len(),
            "Building dim_customer"
        );

        let rows = build_dim_rows(customers, &metrics);
        let written = self.write(WarehouseTable::DimCustomer, rows).await?;
        Ok(BuildOutcome::Written(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_timestamp;

    fn customer(id: &str) -> StagingCustomer {
        StagingCustomer {
            customer_id: id.to_string(),
            customer_unique_id: Some(format!("u-{}", id)),
            city: Some("sao paulo".to_string()),
            state: Some("SP".to_string()),
        }
    }

    fn purchase(order_id: &str, customer_id: Option<&str>, ts: &str) -> OrderPurchase {
        OrderPurchase {
            order_id: order_id.to_string(),
            customer_id: customer_id.map(str::to_string),
            purchased_at: parse_timestamp(ts),
        }
    }

    fn price(order_id: &str, cents: i64) -> ItemPrice {
        ItemPrice {
            order_id: order_id.to_string(),
            price: Decimal::new(cents, 2),
        }
    }

    #[test]
    fn test_zero_order_customer() {
        let rows = build_dim_rows(vec![customer("c1")], &HashMap::new());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_orders, 0);
        assert_eq!(rows[0].total_revenue, Decimal::ZERO);
        assert_eq!(rows[0].first_order_date, None);
        assert_eq!(rows[0].last_order_date, None);
        assert_eq!(rows[0].city.as_deref(), Some("sao paulo"));
    }

    #[test]
    fn test_metrics_aggregate_history() {
        let orders = vec![
            purchase("o1", Some("c1"), "2018-01-10 10:00:00"),
            purchase("o2", Some("c1"), "2018-03-05 12:00:00"),
            purchase("o3", Some("c2"), "not a date"),
            purchase("o4", None, "2018-02-01 00:00:00"),
        ];
        let items = vec![price("o1", 1000), price("o1", 550), price("o2", 200)];

        let revenue = revenue_per_order(&items);
        let metrics = customer_metrics(&orders, &revenue);

        let c1 = &metrics["c1"];
        assert_eq!(c1.first_order_date, NaiveDate::from_ymd_opt(2018, 1, 10));
        assert_eq!(c1.last_order_date, NaiveDate::from_ymd_opt(2018, 3, 5));
        assert_eq!(c1.total_orders, 2);
        assert_eq!(c1.total_revenue, Decimal::new(1750, 2));

        let c2 = &metrics["c2"];
        assert_eq!(c2.total_orders, 1);
        assert_eq!(c2.total_revenue, Decimal::ZERO);
        assert_eq!(c2.first_order_date, None);

        assert_eq!(metrics.len(), 2);
    }

    #[test]
    fn test_customers_without_orders_left_joined() {
        let orders = vec![purchase("o1", Some("c1"), "2018-01-10 10:00:00")];
        let items = [price("o1", 999)];
        let revenue = revenue_per_order(&items);
        let metrics = customer_metrics(&orders, &revenue);

        let rows = build_dim_rows(vec![customer("c1"), customer("c2")], &metrics);

        assert_eq!(rows[0].total_orders, 1);
        assert_eq!(rows[0].total_revenue, Decimal::new(999, 2));
        assert_eq!(rows[1].customer_id, "c2");
        assert_eq!(rows[1].total_orders, 0);
        assert_eq!(rows[1].total_revenue, Decimal::ZERO);
    }

    #[test]
    fn test_repeated_order_row_counts_revenue_once() {
        let orders = vec![
            purchase("o1", Some("c1"), "2018-01-10 10:00:00"),
            purchase("o1", Some("c1"), "2018-01-10 10:00:00"),
            purchase("o2", Some("c1"), "2018-02-01 08:00:00"),
        ];
        let items = [price("o1", 1000), price("o2", 250)];
        let revenue = revenue_per_order(&items);

        let metrics = customer_metrics(&orders, &revenue);

        let c1 = &metrics["c1"];
        assert_eq!(c1.total_orders, 2);
        assert_eq!(c1.total_revenue, Decimal::new(1250, 2));
    }
}
