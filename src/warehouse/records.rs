//! Typed records read from and written to the store.
//!
//! Each [`Record`] names its columns. Rows read from the store implement
//! [`DecodeRow`]; rows written by a builder implement [`EncodeRow`]. Decoding
//! coerces loosely-typed store values with the defaults each builder relies
//! on: unparsable timestamps become `None`, unparsable prices become zero.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::Result;
use crate::value::{coerce_price, ResultSet, Value};

/// A row shape with a fixed column list.
pub trait Record {
    const COLUMNS: &'static [&'static str];
}

/// Read side of a [`Record`].
pub trait DecodeRow: Record + Sized {
    /// Build from values in `COLUMNS` order. `None` drops the row.
    fn from_values(values: &[&Value]) -> Option<Self>;
}

/// Write side of a [`Record`].
pub trait EncodeRow: Record {
    /// Values in `COLUMNS` order.
    fn into_values(self) -> Vec<Value>;
}

/// Decode every row of `rs` into `R`.
///
/// An empty result decodes to an empty vec without consulting its columns.
pub fn decode<R: DecodeRow>(relation: &str, rs: &ResultSet) -> Result<Vec<R>> {
    if rs.is_empty() {
        return Ok(Vec::new());
    }

    let indexes = R::COLUMNS
        .iter()
        .map(|column| rs.require_column(relation, column))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(rs.len());
    let mut skipped = 0usize;
    for row in rs.rows() {
        let values: Vec<&Value> = indexes.iter().map(|&i| &row[i]).collect();
        match R::from_values(&values) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(relation, skipped, "Rows without a key ignored");
    }
    Ok(records)
}

/// Encode records into a result set with `R::COLUMNS`.
pub fn encode<R: EncodeRow>(records: Vec<R>) -> ResultSet {
    let mut rs = ResultSet::new(R::COLUMNS.iter().copied());
    for record in records {
        rs.push_row(record.into_values());
    }
    rs
}

fn key(value: &Value) -> Option<String> {
    value.as_text()
}

/// Customer attributes from `stg_customers`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingCustomer {
    pub customer_id: String,
    pub customer_unique_id: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Record for StagingCustomer {
    const COLUMNS: &'static [&'static str] = &[
        "customer_id",
        "customer_unique_id",
        "customer_city",
        "customer_state",
    ];
}

impl DecodeRow for StagingCustomer {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            customer_id: key(v[0])?,
            customer_unique_id: v[1].as_text(),
            city: v[2].as_text(),
            state: v[3].as_text(),
        })
    }
}

/// Order header fields the order fact needs from `stg_orders`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingOrder {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub order_status: Option<String>,
    pub purchased_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
}

impl Record for StagingOrder {
    const COLUMNS: &'static [&'static str] = &[
        "order_id",
        "customer_id",
        "order_status",
        "order_purchase_timestamp",
        "order_delivered_customer_date",
    ];
}

impl DecodeRow for StagingOrder {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: key(v[0])?,
            customer_id: v[1].as_text(),
            order_status: v[2].as_text(),
            purchased_at: v[3].as_datetime(),
            delivered_at: v[4].as_datetime(),
        })
    }
}

/// Who ordered when, for customer history.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPurchase {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub purchased_at: Option<NaiveDateTime>,
}

impl Record for OrderPurchase {
    const COLUMNS: &'static [&'static str] =
        &["order_id", "customer_id", "order_purchase_timestamp"];
}

impl DecodeRow for OrderPurchase {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: key(v[0])?,
            customer_id: v[1].as_text(),
            purchased_at: v[2].as_datetime(),
        })
    }
}

/// Order line from `stg_order_items`, price already coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingOrderItem {
    pub order_id: String,
    pub order_item_id: Option<i64>,
    pub product_id: Option<String>,
    pub seller_id: Option<String>,
    pub price: Decimal,
}

impl Record for StagingOrderItem {
    const COLUMNS: &'static [&'static str] =
        &["order_id", "order_item_id", "product_id", "seller_id", "price"];
}

impl DecodeRow for StagingOrderItem {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: key(v[0])?,
            order_item_id: v[1].as_i64(),
            product_id: v[2].as_text(),
            seller_id: v[3].as_text(),
            price: coerce_price(v[4]),
        })
    }
}

/// Price of one order line, for revenue per order.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPrice {
    pub order_id: String,
    pub price: Decimal,
}

impl Record for ItemPrice {
    const COLUMNS: &'static [&'static str] = &["order_id", "price"];
}

impl DecodeRow for ItemPrice {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: key(v[0])?,
            price: coerce_price(v[1]),
        })
    }
}

/// Bare order key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub order_id: String,
}

impl Record for OrderKey {
    const COLUMNS: &'static [&'static str] = &["order_id"];
}

impl DecodeRow for OrderKey {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: key(v[0])?,
        })
    }
}

/// Row of `dim_customer`.
#[derive(Debug, Clone, PartialEq)]
pub struct DimCustomerRow {
    pub customer_id: String,
    pub customer_unique_id: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub first_order_date: Option<NaiveDate>,
    pub last_order_date: Option<NaiveDate>,
    pub total_orders: i64,
    pub total_revenue: Decimal,
}

impl Record for DimCustomerRow {
    const COLUMNS: &'static [&'static str] = &[
        "customer_id",
        "customer_unique_id",
        "city",
        "state",
        "first_order_date",
        "last_order_date",
        "total_orders",
        "total_revenue",
    ];
}

impl DecodeRow for DimCustomerRow {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            customer_id: key(v[0])?,
            customer_unique_id: v[1].as_text(),
            city: v[2].as_text(),
            state: v[3].as_text(),
            first_order_date: v[4].as_date(),
            last_order_date: v[5].as_date(),
            total_orders: v[6].as_i64().unwrap_or(0),
            total_revenue: v[7].as_decimal().unwrap_or(Decimal::ZERO),
        })
    }
}

impl EncodeRow for DimCustomerRow {
    fn into_values(self) -> Vec<Value> {
        vec![
            self.customer_id.into(),
            self.customer_unique_id.into(),
            self.city.into(),
            self.state.into(),
            self.first_order_date.into(),
            self.last_order_date.into(),
            self.total_orders.into(),
            self.total_revenue.into(),
        ]
    }
}

/// Row of `fact_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactOrderRow {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub order_status: Option<String>,
    pub num_items: i64,
    pub items_subtotal: Decimal,
    pub order_revenue: Decimal,
    pub delivered_date: Option<NaiveDate>,
}

impl Record for FactOrderRow {
    const COLUMNS: &'static [&'static str] = &[
        "order_id",
        "customer_id",
        "order_date",
        "order_status",
        "num_items",
        "items_subtotal",
        "order_revenue",
        "delivered_date",
    ];
}

impl DecodeRow for FactOrderRow {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: key(v[0])?,
            customer_id: v[1].as_text(),
            order_date: v[2].as_date(),
            order_status: v[3].as_text(),
            num_items: v[4].as_i64().unwrap_or(0),
            items_subtotal: v[5].as_decimal().unwrap_or(Decimal::ZERO),
            order_revenue: v[6].as_decimal().unwrap_or(Decimal::ZERO),
            delivered_date: v[7].as_date(),
        })
    }
}

impl EncodeRow for FactOrderRow {
    fn into_values(self) -> Vec<Value> {
        vec![
            self.order_id.into(),
            self.customer_id.into(),
            self.order_date.into(),
            self.order_status.into(),
            self.num_items.into(),
            self.items_subtotal.into(),
            self.order_revenue.into(),
            self.delivered_date.into(),
        ]
    }
}

/// Row of `fact_order_item`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactOrderItemRow {
    pub order_id: String,
    pub order_item_id: Option<i64>,
    pub product_id: Option<String>,
    pub seller_id: Option<String>,
    pub price: Decimal,
}

impl From<StagingOrderItem> for FactOrderItemRow {
    fn from(item: StagingOrderItem) -> Self {
        Self {
            order_id: item.order_id,
            order_item_id: item.order_item_id,
            product_id: item.product_id,
            seller_id: item.seller_id,
            price: item.price,
        }
    }
}

impl Record for FactOrderItemRow {
    const COLUMNS: &'static [&'static str] =
        &["order_id", "order_item_id", "product_id", "seller_id", "price"];
}

impl EncodeRow for FactOrderItemRow {
    fn into_values(self) -> Vec<Value> {
        vec![
            self.order_id.into(),
            self.order_item_id.into(),
            self.product_id.into(),
            self.seller_id.into(),
            self.price.into(),
        ]
    }
}

/// Row of `final_orders`. Customer attributes are absent when the order's
/// customer has no dimension row.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalOrderRow {
    pub order_id: String,
    pub order_date: Option<NaiveDate>,
    pub order_status: Option<String>,
    pub num_items: i64,
    pub items_subtotal: Decimal,
    pub order_revenue: Decimal,
    pub delivered_date: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub customer_unique_id: Option<String>,
    pub customer_city: Option<String>,
    pub customer_state: Option<String>,
    pub first_order_date: Option<NaiveDate>,
    pub last_order_date: Option<NaiveDate>,
    pub total_orders: Option<i64>,
    pub total_revenue: Option<Decimal>,
}

impl Record for FinalOrderRow {
    const COLUMNS: &'static [&'static str] = &[
        "order_id",
        "order_date",
        "order_status",
        "num_items",
        "items_subtotal",
        "order_revenue",
        "delivered_date",
        "customer_id",
        "customer_unique_id",
        "customer_city",
        "customer_state",
        "first_order_date",
        "last_order_date",
        "total_orders",
        "total_revenue",
    ];
}

impl EncodeRow for FinalOrderRow {
    fn into_values(self) -> Vec<Value> {
        vec![
            self.order_id.into(),
            self.order_date.into(),
            self.order_status.into(),
            self.num_items.into(),
            self.items_subtotal.into(),
            self.order_revenue.into(),
            self.delivered_date.into(),
            self.customer_id.into(),
            self.customer_unique_id.into(),
            self.customer_city.into(),
            self.customer_state.into(),
            self.first_order_date.into(),
            self.last_order_date.into(),
            self.total_orders.into(),
            self.total_revenue.into(),
        ]
    }
}

/// Mart columns checked by the validator. Nothing is defaulted so that
/// absent values stay visible.
#[derive(Debug, Clone, PartialEq)]
pub struct MartCheckRow {
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    pub num_items: Option<i64>,
    pub order_revenue: Option<Decimal>,
}

impl Record for MartCheckRow {
    const COLUMNS: &'static [&'static str] =
        &["order_id", "customer_id", "num_items", "order_revenue"];
}

impl DecodeRow for MartCheckRow {
    fn from_values(v: &[&Value]) -> Option<Self> {
        Some(Self {
            order_id: v[0].as_text(),
            customer_id: v[1].as_text(),
            num_items: v[2].as_i64(),
            order_revenue: v[3].as_decimal(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EltError;

    #[test]
    fn test_decode_empty_ignores_columns() {
        let rs = ResultSet::default();
        let records: Vec<StagingOrder> = decode("stg_orders", &rs).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_decode_missing_column_fails() {
        let rs = ResultSet::with_rows(["order_id"], vec![vec![Value::from("o1")]]);
        let err = decode::<ItemPrice>("stg_order_items", &rs).unwrap_err();
        assert!(matches!(err, EltError::MissingColumn { ref column, .. } if column == "price"));
    }

    #[test]
    fn test_decode_coerces_price_and_timestamps() {
        let rs = ResultSet::with_rows(
            ["price", "order_id", "extra"],
            vec![
                vec![Value::from("12.5"), Value::from("o1"), Value::Null],
                vec![Value::from("n/a"), Value::from("o2"), Value::Null],
            ],
        );
        let items: Vec<ItemPrice> = decode("stg_order_items", &rs).unwrap();
        assert_eq!(items[0].price, Decimal::new(1250, 2));
        assert_eq!(items[1].price, Decimal::ZERO);

        let rs = ResultSet::with_rows(
            ["order_id", "customer_id", "order_purchase_timestamp"],
            vec![vec![Value::from("o1"), Value::from("c1"), Value::from("garbage")]],
        );
        let purchases: Vec<OrderPurchase> = decode("stg_orders", &rs).unwrap();
        assert_eq!(purchases[0].purchased_at, None);
    }

    #[test]
    fn test_decode_skips_rows_without_key() {
        let rs = ResultSet::with_rows(
            ["order_id"],
            vec![vec![Value::Null], vec![Value::from("o1")]],
        );
        let keys: Vec<OrderKey> = decode("fact_order", &rs).unwrap();
        assert_eq!(
            keys,
            vec![OrderKey {
                order_id: "o1".to_string()
            }]
        );
    }

    #[test]
    fn test_encode_uses_record_columns() {
        let rs = encode(vec![FactOrderItemRow {
            order_id: "o1".to_string(),
            order_item_id: Some(1),
            product_id: None,
            seller_id: Some("s1".to_string()),
            price: Decimal::new(999, 2),
        }]);
        assert_eq!(rs.columns(), FactOrderItemRow::COLUMNS);
        assert_eq!(
            rs.rows()[0],
            vec![
                Value::from("o1"),
                Value::Integer(1),
                Value::Null,
                Value::from("s1"),
                Value::Decimal(Decimal::new(999, 2)),
            ]
        );
    }

    #[test]
    fn test_mart_check_keeps_nulls() {
        let rs = ResultSet::with_rows(
            MartCheckRow::COLUMNS.iter().copied(),
            vec![vec![Value::Null, Value::Null, Value::Null, Value::Null]],
        );
        let rows: Vec<MartCheckRow> = decode("final_orders", &rs).unwrap();
        assert_eq!(rows[0].order_id, None);
        assert_eq!(rows[0].num_items, None);
    }
}
