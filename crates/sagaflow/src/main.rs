mod commands;
mod error;
mod output;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sagaflow_engine::SagaEngine;
use sagaflow_store::FileSystemSagaStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::error::{CliError, Result};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "sagaflow")]
#[command(about = "Inspect sagas persisted by the sagaflow engine", long_about = None)]
struct Cli {
    /// Directory holding saga records (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file to read (default: ./sagaflow.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print stored records as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let cwd = std::env::current_dir().map_err(CliError::CurrentDir)?;
    let settings = Settings::load(&cwd, cli.config.as_deref(), cli.store.as_deref())?;
    debug!(store = %settings.store_dir().display(), "opening saga store");

    let engine = open_engine(&settings);
    let formatter = output::formatter(cli.json);
    cli.command.execute(&engine, formatter.as_ref()).await
}

fn open_engine(settings: &Settings) -> SagaEngine {
    let store = Arc::new(FileSystemSagaStore::new(settings.store_dir()));
    SagaEngine::new(store).with_config(settings.engine().clone())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
