//! `waf-live` binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use waf_live_cli::cli::{Cli, Commands};
use waf_live_cli::commands::{InitConfigCommand, SnapshotCommand, WatchCommand};
use waf_live_cli::output::OutputFormat;

const DEFAULT_FILTER: &str = "waf_live=info,waf_live_cli=info";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Watch(args) => {
            let config = cli.load_config().context("loading configuration")?;
            WatchCommand::new(config)
                .execute(&mut stdout, &format, &args.token)
                .await?;
        }
        Commands::Snapshot(args) => {
            let config = cli.load_config().context("loading configuration")?;
            SnapshotCommand::new(config)
                .execute(&mut stdout, &format, args)
                .await?;
        }
        Commands::InitConfig { output, force } => {
            InitConfigCommand::new(output.clone(), *force).execute(&mut stdout)?;
        }
    }

    Ok(())
}
