use anyhow::Result;
use polleq_batch::{collect_config_paths, load_batch_manifest, run_batch, BatchRunnerConfig};
use polleq_cli::Commands;
use polleq_core::PollError;

use super::solver_config;

pub fn handle(command: &Commands) -> Result<()> {
    let Commands::Batch {
        configs,
        data,
        out,
        threads,
        warehouse,
        rebuild,
        solver,
    } = command
    else {
        unreachable!();
    };
    let config_paths = collect_config_paths(configs)?;
    if config_paths.is_empty() {
        return Err(PollError::ConfigInvalid("no config files found".into()).into());
    }
    let summary = run_batch(&BatchRunnerConfig {
        config_paths,
        data_root: data.clone(),
        output_root: out.clone(),
        threads: *threads,
        rebuild: *rebuild,
        solver: solver_config(solver)?,
        warehouse: warehouse.clone(),
    })?;
    println!(
        "batch {} -> {}/{} ok/fail",
        summary.jobs.len(),
        summary.success,
        summary.failure
    );
    let manifest = load_batch_manifest(&summary.manifest_path)?;
    println!(
        "solves {} optimal, {} timed out",
        manifest.solves.optimal, manifest.solves.timed_out
    );
    println!("manifest {}", summary.manifest_path.display());
    for job in summary.jobs.iter().filter(|job| !job.is_ok()) {
        println!(
            "  failed {}: {}",
            job.config_path,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
