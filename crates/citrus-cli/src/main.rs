//! Citrus command line: runs and lists YAML integration tests.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::assertions_on_result_states,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as _;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use cli::{Cli, Commands};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "citrus=info".into()))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            paths,
            config,
            report_dir,
            variables,
            groups,
        } => handlers::handle_run(&paths, &config, report_dir, variables, groups).await,
        Commands::List { paths, config } => {
            handlers::handle_list(&paths, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { config } => {
            handlers::handle_config(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
