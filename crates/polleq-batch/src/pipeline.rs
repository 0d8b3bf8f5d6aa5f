//! One run, end to end: distances table, optimization, result sink.

use anyhow::{Context, Result};
use polleq_algo::{optimize, RunOutcome, SolverConfig};
use polleq_core::{DistanceTable, RunConfig};
use polleq_io::assemble::{load_or_assemble, AssembleOptions};
use polleq_io::paths::ensure_dir;
use polleq_io::{CsvSink, ResultSink};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Where finished runs go.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkTarget {
    /// CSV folder root; tables land in `{root}/{config_set}/`.
    Csv(PathBuf),
    /// DuckDB warehouse file.
    Warehouse(PathBuf),
}

impl SinkTarget {
    pub fn open(&self) -> Result<Box<dyn ResultSink>> {
        match self {
            SinkTarget::Csv(root) => Ok(Box::new(CsvSink::new(root.clone()))),
            #[cfg(feature = "warehouse")]
            SinkTarget::Warehouse(path) => {
                Ok(Box::new(polleq_io::WarehouseSink::open(path)?))
            }
            #[cfg(not(feature = "warehouse"))]
            SinkTarget::Warehouse(path) => Err(polleq_core::PollError::ConfigInvalid(format!(
                "warehouse '{}' requested but polleq was built without the warehouse feature",
                path.display()
            ))
            .into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SinkTarget::Csv(_) => "csv",
            SinkTarget::Warehouse(_) => "warehouse",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub data_root: PathBuf,
    /// Re-assemble the distances table even when the canonical file exists.
    pub rebuild: bool,
    /// Overrides for the solver; `time_limit` is always taken from the run config.
    pub solver: SolverConfig,
    /// Root of the penalty logs; `None` disables them.
    pub log_dir: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        PipelineOptions {
            data_root: data_root.into(),
            rebuild: false,
            solver: SolverConfig::default(),
            log_dir: None,
        }
    }

    fn solver_for(&self, config: &RunConfig) -> SolverConfig {
        SolverConfig {
            time_limit: config.time_limit as f64,
            ..self.solver.clone()
        }
    }
}

/// `{log_dir}/{config_set}/{config_name}.penalty.log`
pub fn penalty_log_path(log_dir: &Path, config: &RunConfig) -> PathBuf {
    log_dir
        .join(&config.config_set)
        .join(format!("{}.penalty.log", config.config_name))
}

/// Loads (or assembles) the distances table for `config`, optimizes and writes the
/// result tables to `sink`. Failures are recorded on the sink before being returned.
pub fn run_pipeline(
    config: &RunConfig,
    options: &PipelineOptions,
    sink: &dyn ResultSink,
) -> Result<(RunOutcome, String)> {
    let assemble_options = AssembleOptions::from(config);
    let table = match load_or_assemble(&options.data_root, &assemble_options, options.rebuild)
        .with_context(|| format!("preparing distances for '{}'", config.config_name))
    {
        Ok(table) => table,
        Err(err) => {
            note_failure(config, sink, &err);
            return Err(err);
        }
    };
    run_with_table(config, &table, options, sink)
}

/// Same as [`run_pipeline`] with the distances table already in hand.
pub fn run_with_table(
    config: &RunConfig,
    table: &DistanceTable,
    options: &PipelineOptions,
    sink: &dyn ResultSink,
) -> Result<(RunOutcome, String)> {
    let result = (|| -> Result<(RunOutcome, String)> {
        let log_path = match &options.log_dir {
            Some(dir) => {
                let path = penalty_log_path(dir, config);
                if let Some(parent) = path.parent() {
                    ensure_dir(parent)?;
                }
                Some(path)
            }
            None => None,
        };
        let outcome = optimize(config, table, &options.solver_for(config), log_path.as_deref())?;
        let output = sink.write(&outcome.record(config), &outcome.tables)?;
        Ok((outcome, output))
    })();

    match result {
        Ok((outcome, output)) => {
            info!(
                config = %config.config_name,
                sink = sink.name(),
                output = %output,
                "run complete"
            );
            Ok((outcome, output))
        }
        Err(err) => {
            note_failure(config, sink, &err);
            Err(err)
        }
    }
}

fn note_failure(config: &RunConfig, sink: &dyn ResultSink, err: &anyhow::Error) {
    let message = format!("{err:#}");
    error!(config = %config.config_name, error = %message, "run failed");
    if let Err(record_err) = sink.record_failure(config, &message) {
        error!(
            config = %config.config_name,
            error = %record_err,
            "could not record failed run"
        );
    }
}
