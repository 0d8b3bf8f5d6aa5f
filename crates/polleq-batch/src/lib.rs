//! # polleq-batch: Run Pipeline and Batch Runner
//!
//! [`pipeline`] chains one run end to end: distances table (assembled or reused),
//! optimization, and a [`polleq_io::ResultSink`]. [`runner`] fans a list of config files
//! out over a Rayon thread pool and records every outcome in `batch_manifest.json`.

pub mod job;
pub mod manifest;
pub mod pipeline;
pub mod runner;

pub use job::{collect_config_paths, BatchJob, BatchJobRecord};
pub use manifest::{load_batch_manifest, write_batch_manifest, BatchManifest, SolveTally};
pub use pipeline::{penalty_log_path, run_pipeline, run_with_table, PipelineOptions, SinkTarget};
pub use runner::{run_batch, BatchRunnerConfig, BatchSummary};
