use anyhow::Result;
use polleq_algo::{MipBackend, SolverConfig};
use polleq_cli::cli::SolverArgs;

pub mod assemble;
pub mod batch;
pub mod configs;
pub mod run;

/// Solver settings from the command line; the time limit is filled in per run.
pub fn solver_config(args: &SolverArgs) -> Result<SolverConfig> {
    let backend = match &args.backend {
        Some(name) => name.parse::<MipBackend>()?,
        None => MipBackend::default(),
    };
    Ok(SolverConfig {
        mip_gap: args.mip_gap,
        threads: args.solver_threads,
        verbose: args.solver_verbose,
        backend,
        ..SolverConfig::default()
    })
}
