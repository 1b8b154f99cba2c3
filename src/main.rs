// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing::debug;

fn main() {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            // Library errors keep their kind-specific exit status
            let code = e
                .downcast_ref::<kiln::Error>()
                .map(|err| err.kind().exit_code())
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Cook {
            formula,
            prefix,
            source,
            jobs,
            keep_builddir,
            json,
        } => {
            debug!("Cooking formula {}", formula.display());
            commands::cmd_cook(config, &formula, prefix, &source, jobs, keep_builddir, json)
        }
        Commands::Fetch { formula, source } => {
            commands::cmd_fetch(config, &formula, &source)?;
            Ok(0)
        }
        Commands::Flags {
            formula,
            source,
            json,
        } => {
            commands::cmd_flags(config, &formula, &source, json)?;
            Ok(0)
        }
        Commands::Deps { formula, json } => {
            commands::cmd_deps(&formula, json)?;
            Ok(0)
        }
        Commands::Validate { formula } => {
            commands::cmd_validate(&formula)?;
            Ok(0)
        }
    }
}
