//! End-to-end pipeline tests against SQLite.
//!
//! Run with: cargo test --test pipeline_sqlite
//!
//! Raw extracts are written to a temporary directory and loaded into an
//! in-memory database, no external dependencies required.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

use ecom_warehouse::config::Config;
use ecom_warehouse::pipeline::{Pipeline, Task, TaskOutcome};
use ecom_warehouse::staging::{CUSTOMERS_FILE, ORDERS_FILE, ORDER_ITEMS_FILE};
use ecom_warehouse::{BuildOutcome, DataQualityFailure, EltError, SqliteStore, Store, Value};

const CUSTOMERS: &str = "\
customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state
c1,u1,01310,sao paulo,SP
c2,u2,20040,rio de janeiro,RJ
c3,u3,NULL,curitiba,PR
";

const ORDERS: &str = "\
order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_carrier_date,order_delivered_customer_date,order_estimated_delivery_date
o1,c1,delivered,2018-03-01 09:15:00,2018-03-01 10:00:00,2018-03-02 08:00:00,2018-03-09 14:30:00,2018-03-20 00:00:00
o2,c1,shipped,2018-04-02 18:40:00,2018-04-02 19:00:00,2018-04-03 09:00:00,,2018-04-25 00:00:00
o3,c2,processing,2018-05-10 11:05:00,,,,2018-06-01 00:00:00
";

const ORDER_ITEMS: &str = "\
order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value
o1,1,p1,s1,2018-03-05 00:00:00,10.00,2.10
o1,2,p2,s1,2018-03-05 00:00:00,5.50,2.10
o2,1,p3,s2,2018-04-06 00:00:00,20.00,4.00
ghost,1,p9,s9,2018-01-01 00:00:00,7.00,1.00
";

fn write_extracts(dir: &Path, orders: &str) {
    fs::write(dir.join(CUSTOMERS_FILE), CUSTOMERS).unwrap();
    fs::write(dir.join(ORDERS_FILE), orders).unwrap();
    fs::write(dir.join(ORDER_ITEMS_FILE), ORDER_ITEMS).unwrap();
}

async fn pipeline(data_dir: &Path) -> (Pipeline, Arc<dyn Store>) {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().await.unwrap());
    let config = Config {
        data_dir: data_dir.to_path_buf(),
        batch_size: 2,
        ..Config::default()
    };
    (Pipeline::new(store.clone(), config), store)
}

async fn snapshot(store: &dyn Store, table: &str, key: &str) -> Vec<Vec<Value>> {
    store
        .query(&format!("SELECT * FROM {} ORDER BY {}", table, key))
        .await
        .unwrap()
        .rows()
        .to_vec()
}

fn money(cents: i64) -> Option<Decimal> {
    Some(Decimal::new(cents, 2))
}

#[tokio::test]
async fn test_missing_raw_files_stop_before_loading() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CUSTOMERS_FILE), CUSTOMERS).unwrap();
    let (pipeline, store) = pipeline(dir.path()).await;

    let report = pipeline.run().await.unwrap();

    assert!(report.is_stopped());
    assert_eq!(report.missing_files.len(), 2);
    assert!(report.tasks.is_empty());

    let tables = store
        .query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .await
        .unwrap();
    assert!(tables.is_empty());
}

#[tokio::test]
async fn test_full_run_builds_warehouse() {
    let dir = TempDir::new().unwrap();
    write_extracts(dir.path(), ORDERS);
    let (pipeline, store) = pipeline(dir.path()).await;

    let report = pipeline.run().await.unwrap();

    assert!(!report.is_stopped());
    assert_eq!(report.tasks.len(), Task::ordered().len());
    assert_eq!(
        report.outcome(Task::LoadStgOrderItems),
        Some(&TaskOutcome::Loaded(4))
    );
    assert_eq!(
        report.outcome(Task::BuildFactOrderItems),
        Some(&TaskOutcome::BuiltItems {
            outcome: BuildOutcome::Written(3),
            orphans_dropped: 1,
        })
    );
    assert_eq!(
        report.outcome(Task::ValidateOrdersMart),
        Some(&TaskOutcome::Done)
    );

    let facts = store
        .query("SELECT order_id, num_items, order_revenue, order_date, delivered_date FROM fact_order ORDER BY order_id")
        .await
        .unwrap();
    let o1 = &facts.rows()[0];
    assert_eq!(o1[1], Value::Integer(2));
    assert_eq!(o1[2].as_decimal(), money(1550));
    assert_eq!(o1[3].as_date(), NaiveDate::from_ymd_opt(2018, 3, 1));
    assert_eq!(o1[4].as_date(), NaiveDate::from_ymd_opt(2018, 3, 9));
    let o3 = &facts.rows()[2];
    assert_eq!(o3[1], Value::Integer(0));
    assert_eq!(o3[2].as_decimal(), money(0));
    assert!(o3[4].is_null());

    let dims = store
        .query("SELECT customer_id, total_orders, total_revenue, first_order_date, last_order_date FROM dim_customer ORDER BY customer_id")
        .await
        .unwrap();
    let c1 = &dims.rows()[0];
    assert_eq!(c1[1], Value::Integer(2));
    assert_eq!(c1[2].as_decimal(), money(3550));
    assert_eq!(c1[3].as_date(), NaiveDate::from_ymd_opt(2018, 3, 1));
    assert_eq!(c1[4].as_date(), NaiveDate::from_ymd_opt(2018, 4, 2));
    let c3 = &dims.rows()[2];
    assert_eq!(c3[1], Value::Integer(0));
    assert_eq!(c3[2].as_decimal(), money(0));
    assert!(c3[3].is_null());
    assert!(c3[4].is_null());

    let mart = store
        .query("SELECT order_id, customer_city, customer_state, total_orders FROM final_orders ORDER BY order_id")
        .await
        .unwrap();
    assert_eq!(mart.len(), 3);
    assert_eq!(mart.rows()[0][1], Value::from("sao paulo"));
    assert_eq!(mart.rows()[2][2], Value::from("RJ"));
    assert_eq!(mart.rows()[2][3], Value::Integer(1));
}

#[tokio::test]
async fn test_orphan_items_never_reach_fact_table() {
    let dir = TempDir::new().unwrap();
    write_extracts(dir.path(), ORDERS);
    let (pipeline, store) = pipeline(dir.path()).await;

    pipeline.run().await.unwrap();

    let orphans = store
        .query("SELECT * FROM fact_order_item WHERE order_id NOT IN (SELECT order_id FROM fact_order)")
        .await
        .unwrap();
    assert!(orphans.is_empty());

    let ghost = store
        .query("SELECT * FROM fact_order_item WHERE order_id = 'ghost'")
        .await
        .unwrap();
    assert!(ghost.is_empty());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_extracts(dir.path(), ORDERS);
    let (pipeline, store) = pipeline(dir.path()).await;

    pipeline.run().await.unwrap();
    let tables = [
        ("dim_customer", "customer_id"),
        ("fact_order", "order_id"),
        ("fact_order_item", "order_id, order_item_id"),
        ("final_orders", "order_id"),
    ];
    let mut first = Vec::new();
    for (table, key) in tables {
        first.push(snapshot(store.as_ref(), table, key).await);
    }

    let report = pipeline.run().await.unwrap();
    assert!(!report.is_stopped());

    for (i, (table, key)) in tables.into_iter().enumerate() {
        assert_eq!(snapshot(store.as_ref(), table, key).await, first[i], "{} changed", table);
    }
}

#[tokio::test]
async fn test_order_without_customer_fails_validation() {
    let dir = TempDir::new().unwrap();
    let orders = format!(
        "{}o4,,delivered,2018-07-01 10:00:00,,,,\n",
        ORDERS
    );
    write_extracts(dir.path(), &orders);
    let (pipeline, store) = pipeline(dir.path()).await;

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(
        err,
        EltError::DataQuality(DataQualityFailure::NullCustomerId)
    ));

    // The mart was still written; only publication is gated.
    let mart = store.query("SELECT order_id FROM final_orders").await.unwrap();
    assert_eq!(mart.len(), 4);
}
