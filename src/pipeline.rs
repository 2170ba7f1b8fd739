//! Sequential task runner for one warehouse refresh.
//!
//! Tasks run one at a time in a fixed topological order. The first fatal
//! error stops the run, so no dependent task ever sees partial upstream
//! output.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::staging::{self, RawFilesCheck};
use crate::storage::schema::create_all_tables;
use crate::storage::Store;
use crate::warehouse::{BuildOutcome, Warehouse};

/// One named step of the refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    CheckRawFiles,
    CreateTables,
    LoadStgCustomers,
    LoadStgOrders,
    LoadStgOrderItems,
    BuildDimCustomer,
    BuildFactOrders,
    BuildFactOrderItems,
    BuildOrdersMart,
    ValidateOrdersMart,
}

impl Task {
    /// Every task, in execution order.
    pub const fn ordered() -> [Task; 10] {
        [
            Task::CheckRawFiles,
            Task::CreateTables,
            Task::LoadStgCustomers,
            Task::LoadStgOrders,
            Task::LoadStgOrderItems,
            Task::BuildDimCustomer,
            Task::BuildFactOrders,
            Task::BuildFactOrderItems,
            Task::BuildOrdersMart,
            Task::ValidateOrdersMart,
        ]
    }

    /// Tasks that must complete before this one starts.
    pub fn depends_on(&self) -> &'static [Task] {
        match self {
            Task::CheckRawFiles => &[],
            Task::CreateTables => &[Task::CheckRawFiles],
            Task::LoadStgCustomers | Task::LoadStgOrders | Task::LoadStgOrderItems => {
                &[Task::CreateTables]
            }
            Task::BuildDimCustomer => &[
                Task::LoadStgCustomers,
                Task::LoadStgOrders,
                Task::LoadStgOrderItems,
            ],
            // fact_order.customer_id references dim_customer
            Task::BuildFactOrders => &[Task::BuildDimCustomer],
            Task::BuildFactOrderItems => &[Task::BuildFactOrders],
            Task::BuildOrdersMart => &[
                Task::BuildDimCustomer,
                Task::BuildFactOrders,
                Task::BuildFactOrderItems,
            ],
            Task::ValidateOrdersMart => &[Task::BuildOrdersMart],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Task::CheckRawFiles => "check_raw_files",
            Task::CreateTables => "create_tables",
            Task::LoadStgCustomers => "load_stg_customers",
            Task::LoadStgOrders => "load_stg_orders",
            Task::LoadStgOrderItems => "load_stg_order_items",
            Task::BuildDimCustomer => "build_dim_customer",
            Task::BuildFactOrders => "build_fact_orders",
            Task::BuildFactOrderItems => "build_fact_order_items",
            Task::BuildOrdersMart => "build_orders_mart",
            Task::ValidateOrdersMart => "validate_orders_mart",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a completed task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Gate, DDL or validation passed.
    Done,
    /// Staging rows loaded.
    Loaded(usize),
    Built(BuildOutcome),
    /// Order-item build, with the number of orphans discarded.
    BuiltItems {
        outcome: BuildOutcome,
        orphans_dropped: usize,
    },
}

/// Per-task record of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub tasks: Vec<(Task, TaskOutcome)>,
    /// Set when the raw-file gate stopped the run.
    pub missing_files: Vec<PathBuf>,
}

impl PipelineReport {
    pub fn stopped(missing: Vec<PathBuf>) -> Self {
        Self {
            tasks: Vec::new(),
            missing_files: missing,
        }
    }

    /// True when the gate stopped the run before anything was loaded.
    pub fn is_stopped(&self) -> bool {
        !self.missing_files.is_empty()
    }

    pub fn outcome(&self, task: Task) -> Option<&TaskOutcome> {
        self.tasks
            .iter()
            .find(|(t, _)| *t == task)
            .map(|(_, outcome)| outcome)
    }
}

enum Step {
    Continue(TaskOutcome),
    Stop(Vec<PathBuf>),
}

/// Runs every task against one store.
pub struct Pipeline {
    store: Arc<dyn Store>,
    config: Config,
}

impl Pipeline {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self { store, config }
    }

    /// Run the full refresh.
    ///
    /// Returns a stopped report when raw files are missing. Any other
    /// failure aborts the run and is returned as-is.
    pub async fn run(&self) -> Result<PipelineReport> {
        let warehouse = Warehouse::new(self.store.clone()).with_batch_size(self.config.batch_size);
        let mut report = PipelineReport::default();

        for task in Task::ordered() {
            let started = Instant::now();
            info!(task = %task, "Starting task");

            let outcome = match self.run_task(task, &warehouse).await {
                Ok(Step::Continue(outcome)) => outcome,
                Ok(Step::Stop(missing)) => {
                    warn!(task = %task, "Stopping run, raw files missing");
                    return Ok(PipelineReport::stopped(missing));
                }
                Err(e) => {
                    error!(task = %task, error = %e, "Task failed, downstream tasks will not run");
                    return Err(e);
                }
            };

            info!(
                task = %task,
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = ?outcome,
                "Task complete"
            );
            report.tasks.push((task, outcome));
        }

        Ok(report)
    }

    async fn run_task(&self, task: Task, warehouse: &Warehouse) -> Result<Step> {
        let store = self.store.as_ref();
        let data_dir = self.config.data_dir.as_path();
        let batch_size = self.config.batch_size;

        let outcome = match task {
            Task::CheckRawFiles => match staging::check_raw_files(data_dir) {
                RawFilesCheck::Proceed => TaskOutcome::Done,
                RawFilesCheck::Stop { missing } => return Ok(Step::Stop(missing)),
            },
            Task::CreateTables => {
                create_all_tables(store).await?;
                TaskOutcome::Done
            }
            Task::LoadStgCustomers => {
                TaskOutcome::Loaded(staging::load_stg_customers(store, data_dir, batch_size).await?)
            }
            Task::LoadStgOrders => {
                TaskOutcome::Loaded(staging::load_stg_orders(store, data_dir, batch_size).await?)
            }
            Task::LoadStgOrderItems => TaskOutcome::Loaded(
                staging::load_stg_order_items(store, data_dir, batch_size).await?,
            ),
            Task::BuildDimCustomer => TaskOutcome::Built(warehouse.build_dim_customer().await?),
            Task::BuildFactOrders => TaskOutcome::Built(warehouse.build_fact_orders().await?),
            Task::BuildFactOrderItems => {
                let report = warehouse.build_fact_order_items().await?;
                TaskOutcome::BuiltItems {
                    outcome: report.outcome,
                    orphans_dropped: report.orphans_dropped,
                }
            }
            Task::BuildOrdersMart => TaskOutcome::Built(warehouse.build_orders_mart().await?),
            Task::ValidateOrdersMart => {
                warehouse.validate_orders_mart().await?;
                TaskOutcome::Done
            }
        };
        Ok(Step::Continue(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_order_respects_dependencies() {
        let mut done: HashSet<Task> = HashSet::new();
        for task in Task::ordered() {
            for dep in task.depends_on() {
                assert!(done.contains(dep), "{} runs before its dependency {}", task, dep);
            }
            done.insert(task);
        }
        assert_eq!(done.len(), Task::ordered().len());
    }

    #[test]
    fn test_validation_is_last() {
        let ordered = Task::ordered();
        assert_eq!(ordered[ordered.len() - 1], Task::ValidateOrdersMart);
        assert!(Task::ValidateOrdersMart.depends_on().contains(&Task::BuildOrdersMart));
    }

    #[test]
    fn test_stopped_report() {
        let report = PipelineReport::stopped(vec![PathBuf::from("orders_data.csv")]);
        assert!(report.is_stopped());
        assert!(report.tasks.is_empty());
        assert_eq!(report.outcome(Task::CreateTables), None);
    }
}
