//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building,
//! plus the idempotent DDL for staging, warehouse and mart tables.

use std::fmt;

use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Iden, Index, Table};
use tracing::info;

use crate::error::Result;
use crate::storage::Store;

/// Every table the engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseTable {
    StgCustomers,
    StgOrders,
    StgOrderItems,
    DimCustomer,
    FactOrder,
    FactOrderItem,
    FinalOrders,
}

impl WarehouseTable {
    pub fn name(&self) -> &'static str {
        match self {
            WarehouseTable::StgCustomers => "stg_customers",
            WarehouseTable::StgOrders => "stg_orders",
            WarehouseTable::StgOrderItems => "stg_order_items",
            WarehouseTable::DimCustomer => "dim_customer",
            WarehouseTable::FactOrder => "fact_order",
            WarehouseTable::FactOrderItem => "fact_order_item",
            WarehouseTable::FinalOrders => "final_orders",
        }
    }
}

impl fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Staging customers, one row per source customer record.
#[derive(Iden)]
pub enum StgCustomers {
    Table,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "customer_unique_id"]
    CustomerUniqueId,
    #[iden = "customer_zip_code_prefix"]
    CustomerZipCodePrefix,
    #[iden = "customer_city"]
    CustomerCity,
    #[iden = "customer_state"]
    CustomerState,
}

/// Staging order headers.
#[derive(Iden)]
pub enum StgOrders {
    Table,
    #[iden = "order_id"]
    OrderId,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "order_status"]
    OrderStatus,
    #[iden = "order_purchase_timestamp"]
    OrderPurchaseTimestamp,
    #[iden = "order_approved_at"]
    OrderApprovedAt,
    #[iden = "order_delivered_carrier_date"]
    OrderDeliveredCarrierDate,
    #[iden = "order_delivered_customer_date"]
    OrderDeliveredCustomerDate,
    #[iden = "order_estimated_delivery_date"]
    OrderEstimatedDeliveryDate,
}

/// Staging order lines.
#[derive(Iden)]
pub enum StgOrderItems {
    Table,
    #[iden = "order_id"]
    OrderId,
    #[iden = "order_item_id"]
    OrderItemId,
    #[iden = "product_id"]
    ProductId,
    #[iden = "seller_id"]
    SellerId,
    #[iden = "shipping_limit_date"]
    ShippingLimitDate,
    #[iden = "price"]
    Price,
    #[iden = "freight_value"]
    FreightValue,
}

/// Customer dimension.
#[derive(Iden)]
pub enum DimCustomer {
    Table,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "customer_unique_id"]
    CustomerUniqueId,
    #[iden = "city"]
    City,
    #[iden = "state"]
    State,
    #[iden = "first_order_date"]
    FirstOrderDate,
    #[iden = "last_order_date"]
    LastOrderDate,
    #[iden = "total_orders"]
    TotalOrders,
    #[iden = "total_revenue"]
    TotalRevenue,
}

/// One row per order.
#[derive(Iden)]
pub enum FactOrder {
    Table,
    #[iden = "order_id"]
    OrderId,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "order_date"]
    OrderDate,
    #[iden = "order_status"]
    OrderStatus,
    #[iden = "num_items"]
    NumItems,
    #[iden = "items_subtotal"]
    ItemsSubtotal,
    #[iden = "order_revenue"]
    OrderRevenue,
    #[iden = "delivered_date"]
    DeliveredDate,
}

/// One row per order line whose parent order exists.
#[derive(Iden)]
pub enum FactOrderItem {
    Table,
    #[iden = "order_id"]
    OrderId,
    #[iden = "order_item_id"]
    OrderItemId,
    #[iden = "product_id"]
    ProductId,
    #[iden = "seller_id"]
    SellerId,
    #[iden = "price"]
    Price,
}

/// Denormalized reporting mart.
#[derive(Iden)]
pub enum FinalOrders {
    Table,
    #[iden = "order_id"]
    OrderId,
    #[iden = "order_date"]
    OrderDate,
    #[iden = "order_status"]
    OrderStatus,
    #[iden = "num_items"]
    NumItems,
    #[iden = "items_subtotal"]
    ItemsSubtotal,
    #[iden = "order_revenue"]
    OrderRevenue,
    #[iden = "delivered_date"]
    DeliveredDate,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "customer_unique_id"]
    CustomerUniqueId,
    #[iden = "customer_city"]
    CustomerCity,
    #[iden = "customer_state"]
    CustomerState,
    #[iden = "first_order_date"]
    FirstOrderDate,
    #[iden = "last_order_date"]
    LastOrderDate,
    #[iden = "total_orders"]
    TotalOrders,
    #[iden = "total_revenue"]
    TotalRevenue,
}

const ID_LEN: u32 = 50;
const CITY_LEN: u32 = 255;
const STATE_LEN: u32 = 10;

/// Create every staging, warehouse and mart table if missing.
///
/// Tables are created parents-first so foreign keys resolve.
pub async fn create_all_tables(store: &dyn Store) -> Result<()> {
    let mut statements = Vec::new();

    statements.push(
        store.build_table_create(
            Table::create()
                .table(StgCustomers::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(StgCustomers::CustomerId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(StgCustomers::CustomerUniqueId).string_len(ID_LEN))
                .col(ColumnDef::new(StgCustomers::CustomerZipCodePrefix).integer().null())
                .col(ColumnDef::new(StgCustomers::CustomerCity).string_len(CITY_LEN))
                .col(ColumnDef::new(StgCustomers::CustomerState).string_len(STATE_LEN))
                .to_owned(),
        ),
    );

    statements.push(
        store.build_table_create(
            Table::create()
                .table(StgOrders::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(StgOrders::OrderId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(StgOrders::CustomerId).string_len(ID_LEN))
                .col(ColumnDef::new(StgOrders::OrderStatus).string_len(ID_LEN))
                .col(ColumnDef::new(StgOrders::OrderPurchaseTimestamp).date_time())
                .col(ColumnDef::new(StgOrders::OrderApprovedAt).date_time().null())
                .col(ColumnDef::new(StgOrders::OrderDeliveredCarrierDate).date_time().null())
                .col(ColumnDef::new(StgOrders::OrderDeliveredCustomerDate).date_time().null())
                .col(ColumnDef::new(StgOrders::OrderEstimatedDeliveryDate).date_time().null())
                .to_owned(),
        ),
    );

    statements.push(
        store.build_index_create(
            Index::create()
                .if_not_exists()
                .name("idx_stg_orders_customer_id")
                .table(StgOrders::Table)
                .col(StgOrders::CustomerId)
                .to_owned(),
        ),
    );

    statements.push(
        store.build_table_create(
            Table::create()
                .table(StgOrderItems::Table)
                .if_not_exists()
                .col(ColumnDef::new(StgOrderItems::OrderId).string_len(ID_LEN).not_null())
                .col(ColumnDef::new(StgOrderItems::OrderItemId).integer().not_null())
                .col(ColumnDef::new(StgOrderItems::ProductId).string_len(ID_LEN))
                .col(ColumnDef::new(StgOrderItems::SellerId).string_len(ID_LEN))
                .col(ColumnDef::new(StgOrderItems::ShippingLimitDate).date_time())
                .col(ColumnDef::new(StgOrderItems::Price).decimal_len(10, 2))
                .col(ColumnDef::new(StgOrderItems::FreightValue).decimal_len(10, 2))
                .primary_key(
                    Index::create()
                        .col(StgOrderItems::OrderId)
                        .col(StgOrderItems::OrderItemId),
                )
                .to_owned(),
        ),
    );

    statements.push(
        store.build_index_create(
            Index::create()
                .if_not_exists()
                .name("idx_stg_order_items_order_id")
                .table(StgOrderItems::Table)
                .col(StgOrderItems::OrderId)
                .to_owned(),
        ),
    );

    statements.push(
        store.build_table_create(
            Table::create()
                .table(DimCustomer::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(DimCustomer::CustomerId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(DimCustomer::CustomerUniqueId).string_len(ID_LEN))
                .col(ColumnDef::new(DimCustomer::City).string_len(CITY_LEN))
                .col(ColumnDef::new(DimCustomer::State).string_len(STATE_LEN))
                .col(ColumnDef::new(DimCustomer::FirstOrderDate).date())
                .col(ColumnDef::new(DimCustomer::LastOrderDate).date())
                .col(ColumnDef::new(DimCustomer::TotalOrders).integer())
                .col(ColumnDef::new(DimCustomer::TotalRevenue).decimal_len(12, 2))
                .to_owned(),
        ),
    );

    statements.push(
        store.build_table_create(
            Table::create()
                .table(FactOrder::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(FactOrder::OrderId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(FactOrder::CustomerId).string_len(ID_LEN).null())
                .col(ColumnDef::new(FactOrder::OrderDate).date())
                .col(ColumnDef::new(FactOrder::OrderStatus).string_len(ID_LEN))
                .col(ColumnDef::new(FactOrder::NumItems).integer())
                .col(ColumnDef::new(FactOrder::ItemsSubtotal).decimal_len(12, 2))
                .col(ColumnDef::new(FactOrder::OrderRevenue).decimal_len(12, 2))
                .col(ColumnDef::new(FactOrder::DeliveredDate).date())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_fact_order_customer")
                        .from(FactOrder::Table, FactOrder::CustomerId)
                        .to(DimCustomer::Table, DimCustomer::CustomerId)
                        .on_delete(ForeignKeyAction::SetNull)
                        .on_update(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        ),
    );

    statements.push(
        store.build_index_create(
            Index::create()
                .if_not_exists()
                .name("idx_fact_order_customer_id")
                .table(FactOrder::Table)
                .col(FactOrder::CustomerId)
                .to_owned(),
        ),
    );

    statements.push(
        store.build_table_create(
            Table::create()
                .table(FactOrderItem::Table)
                .if_not_exists()
                .col(ColumnDef::new(FactOrderItem::OrderId).string_len(ID_LEN).not_null())
                .col(ColumnDef::new(FactOrderItem::OrderItemId).integer().not_null())
                .col(ColumnDef::new(FactOrderItem::ProductId).string_len(ID_LEN))
                .col(ColumnDef::new(FactOrderItem::SellerId).string_len(ID_LEN))
                .col(ColumnDef::new(FactOrderItem::Price).decimal_len(10, 2))
                .primary_key(
                    Index::create()
                        .col(FactOrderItem::OrderId)
                        .col(FactOrderItem::OrderItemId),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_fact_order_item_order")
                        .from(FactOrderItem::Table, FactOrderItem::OrderId)
                        .to(FactOrder::Table, FactOrder::OrderId)
                        .on_delete(ForeignKeyAction::Cascade)
                        .on_update(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        ),
    );

    statements.push(
        store.build_index_create(
            Index::create()
                .if_not_exists()
                .name("idx_fact_order_item_order_id")
                .table(FactOrderItem::Table)
                .col(FactOrderItem::OrderId)
                .to_owned(),
        ),
    );

    statements.push(
        store.build_table_create(
            Table::create()
                .table(FinalOrders::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(FinalOrders::OrderId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(FinalOrders::OrderDate).date())
                .col(ColumnDef::new(FinalOrders::OrderStatus).string_len(ID_LEN))
                .col(ColumnDef::new(FinalOrders::NumItems).integer())
                .col(ColumnDef::new(FinalOrders::ItemsSubtotal).decimal_len(12, 2))
                .col(ColumnDef::new(FinalOrders::OrderRevenue).decimal_len(12, 2))
                .col(ColumnDef::new(FinalOrders::DeliveredDate).date())
                .col(ColumnDef::new(FinalOrders::CustomerId).string_len(ID_LEN))
                .col(ColumnDef::new(FinalOrders::CustomerUniqueId).string_len(ID_LEN))
                .col(ColumnDef::new(FinalOrders::CustomerCity).string_len(CITY_LEN))
                .col(ColumnDef::new(FinalOrders::CustomerState).string_len(STATE_LEN))
                .col(ColumnDef::new(FinalOrders::FirstOrderDate).date())
                .col(ColumnDef::new(FinalOrders::LastOrderDate).date())
                .col(ColumnDef::new(FinalOrders::TotalOrders).integer())
                .col(ColumnDef::new(FinalOrders::TotalRevenue).decimal_len(12, 2))
                .to_owned(),
        ),
    );

    statements.push(
        store.build_index_create(
            Index::create()
                .if_not_exists()
                .name("idx_final_orders_customer_id")
                .table(FinalOrders::Table)
                .col(FinalOrders::CustomerId)
                .to_owned(),
        ),
    );

    store.execute_batch(&statements).await?;
    info!(statements = statements.len(), "Warehouse tables ensured");
    Ok(())
}
