use anyhow::Result;
use polleq_batch::{run_pipeline, PipelineOptions, SinkTarget};
use polleq_cli::Commands;
use polleq_core::load_config;
use tracing::info;

use super::solver_config;

pub fn handle(command: &Commands) -> Result<()> {
    let Commands::Run {
        config,
        data,
        out,
        warehouse,
        rebuild,
        solver,
    } = command
    else {
        unreachable!();
    };
    let run = load_config(config)?;
    let target = match warehouse {
        Some(path) => SinkTarget::Warehouse(path.clone()),
        None => SinkTarget::Csv(out.clone()),
    };
    let sink = target.open()?;
    let options = PipelineOptions {
        data_root: data.clone(),
        rebuild: *rebuild,
        solver: solver_config(solver)?,
        log_dir: Some(out.clone()),
    };
    info!(config = %run.config_name, sink = target.name(), "starting run");
    let (outcome, output) = run_pipeline(&run, &options, sink.as_ref())?;

    println!("config     {}", run.config_name);
    println!("status     {}", outcome.status);
    println!("objective  {}", outcome.objective);
    if let Some(gap) = outcome.gap {
        println!("gap        {gap:.4}");
    }
    if let Some(ede) = outcome.tables.ede_for("population").and_then(|row| row.y_ede) {
        println!("ede        {ede:.2}");
    }
    if let Some(penalty) = outcome.penalty {
        println!("penalty    {penalty}");
    }
    println!("open sites {}", outcome.tables.open_site_count());
    println!("output     {output}");
    Ok(())
}
