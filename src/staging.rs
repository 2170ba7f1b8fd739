//! Raw-file gate and staging loaders.
//!
//! Each loader parses one CSV extract and replaces the contents of its
//! staging table: the delete and every insert batch run in one transaction,
//! so a failed load leaves the previous staging data in place.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use sea_query::{Alias, DynIden, IntoIden, Query, SimpleExpr};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::error::{EltError, Result};
use crate::storage::schema::{StgCustomers, StgOrderItems, StgOrders};
use crate::storage::{Store, WarehouseTable};
use crate::value::Value;

pub const CUSTOMERS_FILE: &str = "customers_data.csv";
pub const ORDERS_FILE: &str = "orders_data.csv";
pub const ORDER_ITEMS_FILE: &str = "order_items_data.csv";

/// Extracts that must all be present before anything is loaded.
pub const REQUIRED_RAW_FILES: [&str; 3] = [CUSTOMERS_FILE, ORDERS_FILE, ORDER_ITEMS_FILE];

/// Outcome of the raw-file gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFilesCheck {
    Proceed,
    /// At least one extract is missing; nothing should be loaded.
    Stop { missing: Vec<PathBuf> },
}

/// Check that every required extract exists under `data_dir`.
pub fn check_raw_files(data_dir: &Path) -> RawFilesCheck {
    let missing: Vec<PathBuf> = REQUIRED_RAW_FILES
        .iter()
        .map(|name| data_dir.join(name))
        .filter(|path| !path.exists())
        .collect();

    if missing.is_empty() {
        info!("All required raw files present. Proceeding with ETL.");
        RawFilesCheck::Proceed
    } else {
        warn!(
            missing = ?missing,
            "Missing required raw files, stopping to avoid partial load"
        );
        RawFilesCheck::Stop { missing }
    }
}

#[derive(Debug, Deserialize)]
struct CustomerRecord {
    customer_id: String,
    customer_unique_id: Option<String>,
    #[serde(deserialize_with = "zip_prefix")]
    customer_zip_code_prefix: Option<i64>,
    customer_city: Option<String>,
    customer_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderRecord {
    order_id: String,
    customer_id: Option<String>,
    order_status: Option<String>,
    order_purchase_timestamp: Option<String>,
    order_approved_at: Option<String>,
    order_delivered_carrier_date: Option<String>,
    order_delivered_customer_date: Option<String>,
    order_estimated_delivery_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderItemRecord {
    order_id: String,
    order_item_id: i64,
    product_id: Option<String>,
    seller_id: Option<String>,
    shipping_limit_date: Option<String>,
    #[serde(deserialize_with = "decimal")]
    price: Decimal,
    #[serde(deserialize_with = "decimal")]
    freight_value: Decimal,
}

/// Empty or `NULL` means no prefix; anything else must be an integer.
fn zip_prefix<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("NULL") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Decimal, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse().map_err(serde::de::Error::custom)
}

fn read_csv<T: for<'de> Deserialize<'de>>(data_dir: &Path, file: &str) -> Result<Vec<T>> {
    let csv_error = |source: csv::Error| EltError::Csv {
        file: file.to_string(),
        source,
    };

    let mut reader = csv::Reader::from_path(data_dir.join(file)).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(csv_error)
}

fn text(value: Option<String>) -> Value {
    // Empty extract fields are absent, never empty strings.
    value.filter(|s| !s.is_empty()).into()
}

/// Replace the contents of `table` with `rows` in one transaction.
async fn truncate_and_insert(
    store: &dyn Store,
    table: WarehouseTable,
    columns: &[DynIden],
    rows: Vec<Vec<Value>>,
    batch_size: usize,
) -> Result<usize> {
    let mut statements = vec![store.build_delete(
        Query::delete()
            .from_table(Alias::new(table.name()))
            .to_owned(),
    )];

    for chunk in rows.chunks(batch_size.max(1)) {
        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(table.name()))
            .columns(columns.iter().cloned());
        for row in chunk {
            insert.values(row.iter().cloned().map(|v| SimpleExpr::Value(v.into())))?;
        }
        statements.push(store.build_insert(insert));
    }

    store.execute_batch(&statements).await?;

    info!(table = table.name(), rows = rows.len(), "Inserted staging rows");
    Ok(rows.len())
}

/// Reload `stg_customers` from `customers_data.csv`.
pub async fn load_stg_customers(store: &dyn Store, data_dir: &Path, batch_size: usize) -> Result<usize> {
    let records: Vec<CustomerRecord> = read_csv(data_dir, CUSTOMERS_FILE)?;

    let columns = [
        StgCustomers::CustomerId.into_iden(),
        StgCustomers::CustomerUniqueId.into_iden(),
        StgCustomers::CustomerZipCodePrefix.into_iden(),
        StgCustomers::CustomerCity.into_iden(),
        StgCustomers::CustomerState.into_iden(),
    ];
    let rows = records
        .into_iter()
        .map(|r| {
            vec![
                r.customer_id.into(),
                text(r.customer_unique_id),
                r.customer_zip_code_prefix.into(),
                text(r.customer_city),
                text(r.customer_state),
            ]
        })
        .collect();

    truncate_and_insert(store, WarehouseTable::StgCustomers, &columns, rows, batch_size).await
}

/// Reload `stg_orders` from `orders_data.csv`.
pub async fn load_stg_orders(store: &dyn Store, data_dir: &Path, batch_size: usize) -> Result<usize> {
    let records: Vec<OrderRecord> = read_csv(data_dir, ORDERS_FILE)?;

    let columns = [
        StgOrders::OrderId.into_iden(),
        StgOrders::CustomerId.into_iden(),
        StgOrders::OrderStatus.into_iden(),
        StgOrders::OrderPurchaseTimestamp.into_iden(),
        StgOrders::OrderApprovedAt.into_iden(),
        StgOrders::OrderDeliveredCarrierDate.into_iden(),
        StgOrders::OrderDeliveredCustomerDate.into_iden(),
        StgOrders::OrderEstimatedDeliveryDate.into_iden(),
    ];
    let rows = records
        .into_iter()
        .map(|r| {
            vec![
                r.order_id.into(),
                text(r.customer_id),
                text(r.order_status),
                text(r.order_purchase_timestamp),
                text(r.order_approved_at),
                text(r.order_delivered_carrier_date),
                text(r.order_delivered_customer_date),
                text(r.order_estimated_delivery_date),
            ]
        })
        .collect();

    truncate_and_insert(store, WarehouseTable::StgOrders, &columns, rows, batch_size).await
}

/// Reload `stg_order_items` from `order_items_data.csv`.
///
/// A non-integer item id or non-numeric price aborts the load.
pub async fn load_stg_order_items(
    store: &dyn Store,
    data_dir: &Path,
    batch_size: usize,
) -> Result<usize> {
    let records: Vec<OrderItemRecord> = read_csv(data_dir, ORDER_ITEMS_FILE)?;

    let columns = [
        StgOrderItems::OrderId.into_iden(),
        StgOrderItems::OrderItemId.into_iden(),
        StgOrderItems::ProductId.into_iden(),
        StgOrderItems::SellerId.into_iden(),
        StgOrderItems::ShippingLimitDate.into_iden(),
        StgOrderItems::Price.into_iden(),
        StgOrderItems::FreightValue.into_iden(),
    ];
    let rows = records
        .into_iter()
        .map(|r| {
            vec![
                r.order_id.into(),
                r.order_item_id.into(),
                text(r.product_id),
                text(r.seller_id),
                text(r.shipping_limit_date),
                r.price.into(),
                r.freight_value.into(),
            ]
        })
        .collect();

    truncate_and_insert(store, WarehouseTable::StgOrderItems, &columns, rows, batch_size).await
}
