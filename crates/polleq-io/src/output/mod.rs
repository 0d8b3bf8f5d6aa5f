//! Result sinks.
//!
//! Both backends receive the same four tables (`results`, `precinct_distances`,
//! `residence_distances`, `edes`) and must not leave a partial run behind.

use anyhow::Result;
use polleq_core::{ResultTables, RunConfig, RunRecord};

pub mod csv;
pub mod frames;
#[cfg(feature = "warehouse")]
pub mod warehouse;

pub use self::csv::CsvSink;
#[cfg(feature = "warehouse")]
pub use self::warehouse::WarehouseSink;

/// Table names, in write order.
pub const TABLE_NAMES: [&str; 4] = [
    "results",
    "precinct_distances",
    "residence_distances",
    "edes",
];

/// Destination of finished runs. Shared by all workers of a batch.
pub trait ResultSink: Send + Sync {
    /// Backend name for logs and manifests.
    fn name(&self) -> &'static str;

    /// Persists one successful run. Returns where it went (a folder or a run id).
    fn write(&self, record: &RunRecord, tables: &ResultTables) -> Result<String>;

    /// Notes a failed run.
    fn record_failure(&self, config: &RunConfig, error: &str) -> Result<()>;
}
