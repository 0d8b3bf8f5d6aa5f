use clap::Parser;
use polleq_cli::{Cli, Commands};
use polleq_core::exit_code_for;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let result = match &cli.command {
        Commands::Run { .. } => commands::run::handle(&cli.command),
        Commands::Batch { .. } => commands::batch::handle(&cli.command),
        Commands::Assemble { .. } => commands::assemble::handle(&cli.command),
        Commands::Configs { command } => commands::configs::handle(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code_for(&err);
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
