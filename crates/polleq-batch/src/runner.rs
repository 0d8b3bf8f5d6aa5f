use crate::job::{BatchJob, BatchJobRecord};
use crate::manifest::{write_batch_manifest, BatchManifest};
use crate::pipeline::{run_with_table, PipelineOptions, SinkTarget};
use anyhow::{Context, Result};
use polleq_algo::SolverConfig;
use polleq_core::{exit_code_for, load_config, DistanceTable, RunConfig};
use polleq_io::assemble::{load_or_assemble, AssembleOptions};
use polleq_io::ResultSink;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Settings for one batch of config files.
pub struct BatchRunnerConfig {
    pub config_paths: Vec<PathBuf>,
    pub data_root: PathBuf,
    /// Receives `batch_manifest.json`, the CSV tables (without a warehouse) and the
    /// penalty logs.
    pub output_root: PathBuf,
    /// Worker threads; 0 uses every CPU.
    pub threads: usize,
    pub rebuild: bool,
    pub solver: SolverConfig,
    /// Writes results to this DuckDB file instead of CSV folders.
    pub warehouse: Option<PathBuf>,
}

impl BatchRunnerConfig {
    fn sink_target(&self) -> SinkTarget {
        match &self.warehouse {
            Some(path) => SinkTarget::Warehouse(path.clone()),
            None => SinkTarget::Csv(self.output_root.clone()),
        }
    }
}

/// Summary returned after the run so clients can log success/failure counts and manifest location.
pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

enum Prepared {
    Ready(RunConfig, AssembleOptions),
    Failed(anyhow::Error),
}

/// Message and exit code of a table that could not be prepared.
type TableError = (String, i32);

fn failed_record(job: &BatchJob, config: Option<&RunConfig>, err: &anyhow::Error) -> BatchJobRecord {
    failed_with(job, config, format!("{err:#}"), exit_code_for(err))
}

fn failed_with(job: &BatchJob, config: Option<&RunConfig>, message: String, exit_code: i32) -> BatchJobRecord {
    BatchJobRecord {
        job_id: job.job_id.clone(),
        config_path: job.config_path.display().to_string(),
        config_name: config.map(|c| c.config_name.clone()),
        config_id: config.map(|c| c.config_id()),
        status: "error".into(),
        error: Some(message),
        exit_code,
        objective: None,
        solve_status: None,
        best_bound: None,
        gap: None,
        output: None,
    }
}

pub fn run_batch(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!(
            "creating batch output root '{}'",
            config.output_root.display()
        )
    })?;
    let target = config.sink_target();
    let sink = target.open()?;

    let jobs: Vec<BatchJob> = config
        .config_paths
        .iter()
        .enumerate()
        .map(|(i, path)| BatchJob::new(i, path.clone()))
        .collect();

    let prepared: Vec<Prepared> = jobs
        .iter()
        .map(|job| match load_config(&job.config_path) {
            Ok(run) => {
                let options = AssembleOptions::from(&run);
                Prepared::Ready(run, options)
            }
            Err(err) => Prepared::Failed(err),
        })
        .collect();

    // Assembly writes the canonical file, so each distinct table is prepared once
    // before the workers start.
    let mut tables: HashMap<AssembleOptions, Result<DistanceTable, TableError>> = HashMap::new();
    for item in &prepared {
        if let Prepared::Ready(_, options) = item {
            if tables.contains_key(options) {
                continue;
            }
            let table = load_or_assemble(&config.data_root, options, config.rebuild)
                .map_err(|err| (format!("{err:#}"), exit_code_for(&err)));
            if let Err((message, _)) = &table {
                warn!(location = %options.location, error = %message, "distances unavailable");
            }
            tables.insert(options.clone(), table);
        }
    }

    let options = PipelineOptions {
        data_root: config.data_root.clone(),
        rebuild: false,
        solver: config.solver.clone(),
        log_dir: Some(config.output_root.clone()),
    };

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for batch runs")?;
    info!(jobs = jobs.len(), threads = thread_count, sink = target.name(), "starting batch");

    let job_records: Vec<BatchJobRecord> = pool.install(|| {
        jobs.par_iter()
            .zip(prepared.par_iter())
            .map(|(job, item)| run_job(job, item, &tables, &options, sink.as_ref()))
            .collect()
    });

    let manifest = BatchManifest::new(target.name(), job_records.clone());
    let (success, failure) = (manifest.success, manifest.failure);
    let manifest_path = config.output_root.join("batch_manifest.json");
    write_batch_manifest(&manifest_path, &manifest)?;
    info!(
        success,
        failure,
        timed_out = manifest.solves.timed_out,
        max_gap = ?manifest.solves.max_gap,
        manifest = %manifest_path.display(),
        "batch finished"
    );
    Ok(BatchSummary {
        success,
        failure,
        manifest_path,
        jobs: job_records,
    })
}

/// Runs one config on its own copy of the prepared table.
fn run_job(
    job: &BatchJob,
    item: &Prepared,
    tables: &HashMap<AssembleOptions, Result<DistanceTable, TableError>>,
    options: &PipelineOptions,
    sink: &dyn ResultSink,
) -> BatchJobRecord {
    let (run, assemble_options) = match item {
        Prepared::Ready(run, assemble_options) => (run, assemble_options),
        Prepared::Failed(err) => return failed_record(job, None, err),
    };
    let table = match tables.get(assemble_options) {
        Some(Ok(table)) => table.clone(),
        Some(Err((message, code))) => {
            if let Err(err) = sink.record_failure(run, message) {
                warn!(config = %run.config_name, error = %err, "could not record failed run");
            }
            return failed_with(job, Some(run), message.clone(), *code);
        }
        None => {
            let message = format!("no distances table prepared for '{}'", run.location);
            return failed_with(job, Some(run), message, 1);
        }
    };

    match run_with_table(run, &table, options, sink) {
        Ok((outcome, output)) => BatchJobRecord {
            job_id: job.job_id.clone(),
            config_path: job.config_path.display().to_string(),
            config_name: Some(run.config_name.clone()),
            config_id: Some(run.config_id()),
            status: "ok".into(),
            error: None,
            exit_code: 0,
            objective: Some(outcome.objective),
            solve_status: Some(outcome.status.to_string()),
            best_bound: outcome.best_bound,
            gap: outcome.gap,
            output: Some(output),
        },
        Err(err) => failed_record(job, Some(run), &err),
    }
}
