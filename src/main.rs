mod agents;
mod cli;
mod config;
mod error;
mod repository;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;
use utils::actions::ActionsHost;
use workflow::RemoteOptions;

fn init_tracing(log_filter: &str, verbose: bool) {
    let directives = if verbose {
        format!("{log_filter},chartbump=debug")
    } else {
        log_filter.to_string()
    };
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("chartbump=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter, cli.verbose);
    let host = ActionsHost::from_env();

    let result = match cli.command {
        Commands::Update {
            target,
            token,
            repository,
            base_branch,
            api_url,
            reset_existing_branch,
        } => workflow::execute_update(
            &cli.path,
            target.into(),
            RemoteOptions {
                token,
                repository,
                base_branch,
                api_url,
                reset_existing_branch,
            },
            &host,
        ),
        Commands::Check { target } => workflow::execute_check(&cli.path, target.into(), &host),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        host.error(&e.to_string());
        process::exit(1);
    }
}
