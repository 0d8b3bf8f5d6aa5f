use anyhow::Result;
use polleq_cli::Commands;
use polleq_io::assemble::{assemble, AssembleOptions};

pub fn handle(command: &Commands) -> Result<()> {
    let Commands::Assemble {
        location,
        data,
        driving,
        log_distance,
        census_year,
        map_source_date,
    } = command
    else {
        unreachable!();
    };
    let options = AssembleOptions {
        location: location.clone(),
        census_year: *census_year,
        driving: *driving,
        log_distance: *log_distance,
        map_source_date: map_source_date.clone(),
    };
    let (path, table) = assemble(data, &options)?;
    println!(
        "assembled {} pairs ({} origins, {} destinations) -> {}",
        table.len(),
        table.origin_ids().len(),
        table.destination_ids().len(),
        path.display()
    );
    Ok(())
}
