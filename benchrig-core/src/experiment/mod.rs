//! Experiment drivers
//!
//! An [`Experiment`] turns its settings into a sweep of cases, plans each case
//! as a [`RunPlan`] and renders the CSV row of a finished run. The shared
//! driver executes the plans one at a time against the fleet.

mod driver;
mod plan;
mod record;
mod rx_cache;
mod solar;
mod tx_offload;

pub use driver::{RunOutcome, plan_all, run_experiment, run_plan};
pub use plan::{Launch, RolePlan, RunPlan, role_log_path, run_port};
pub use record::{MEMORY_COLUMNS, ResultWriter, fixed6, memory_cells, timestamp_utc};
pub use rx_cache::{RX_METHODS, RxCache, RxCacheSettings, RxCase};
pub use solar::{SOLAR_BINARY, SOLAR_TYPES, Solar, SolarCase, SolarSettings};
pub use tx_offload::{TX_METHODS, TxCase, TxOffload, TxOffloadSettings};

use std::path::Path;

use crate::error::BenchResult;

/// Common interface of the experiment suites
pub trait Experiment {
    /// One point of the sweep
    type Case;

    /// Short identifier (`tx-offload`, `rx-cache`, `solar`)
    fn experiment_id(&self) -> &'static str;

    /// Human-readable name
    fn display_name(&self) -> &'static str;

    /// CSV header
    fn header(&self) -> Vec<&'static str>;

    /// Every case, in execution order
    fn cases(&self) -> Vec<Self::Case>;

    /// Plans the run of `case` at position `index`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a node cannot be resolved or the port
    /// range is exhausted.
    fn plan_case(&self, case: &Self::Case, index: usize, log_dir: &Path) -> BenchResult<RunPlan>;

    /// Renders the CSV row of a finished run
    fn row(&self, case: &Self::Case, plan: &RunPlan, outcome: &RunOutcome) -> Vec<String>;

    /// Binaries this experiment may leave behind
    fn binaries(&self) -> Vec<String>;
}
