//! E-commerce warehouse - batch ELT engine
//!
//! Loads raw customer, order and order-item extracts into staging tables,
//! builds a star schema (`dim_customer`, `fact_order`, `fact_order_item`)
//! plus the denormalized `final_orders` mart, and gates publication on a
//! data-quality check.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod staging;
pub mod storage;
pub mod utils;
pub mod value;
pub mod warehouse;

pub use config::Config;
pub use error::{DataQualityFailure, EltError, Result};
pub use pipeline::{Pipeline, PipelineReport, Task, TaskOutcome};
pub use storage::{init_store, SqliteStore, Store};
pub use value::{ResultSet, Value};
pub use warehouse::{BuildOutcome, SkipReason, Warehouse};
