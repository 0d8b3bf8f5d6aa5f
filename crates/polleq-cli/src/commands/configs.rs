use anyhow::{anyhow, Result};
use polleq_cli::cli::{split_values, ConfigCommands};
use polleq_core::{generate_variants, load_config, write_variants};
use std::io::{self, Write};
use tabwriter::TabWriter;

pub fn handle(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Generate {
            base,
            field,
            values,
            out,
        } => {
            let base_config = load_config(base)?;
            let values = split_values(values);
            if values.is_empty() {
                return Err(anyhow!("--values is empty"));
            }
            let variants = generate_variants(&base_config, field, &values)?;
            let dir = match out {
                Some(dir) => dir.clone(),
                None => base
                    .parent()
                    .map(|p| p.to_path_buf())
                    .ok_or_else(|| anyhow!("'{}' has no parent folder", base.display()))?,
            };
            for path in write_variants(&dir, &variants)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        ConfigCommands::Validate { configs } => validate(configs),
    }
}

fn validate(configs: &[std::path::PathBuf]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "CONFIG\tSTATUS\tID / ERROR")?;
    let mut first_error = None;
    let mut invalid = 0usize;
    for path in configs {
        match load_config(path) {
            Ok(config) => {
                writeln!(writer, "{}\tok\t{}", path.display(), config.config_id())?;
            }
            Err(err) => {
                writeln!(writer, "{}\tinvalid\t{err:#}", path.display())?;
                invalid += 1;
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    writer.flush()?;
    match first_error {
        None => Ok(()),
        Some(err) => Err(err.context(format!("{invalid} of {} configs are invalid", configs.len()))),
    }
}
