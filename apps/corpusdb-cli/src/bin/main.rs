use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use corpusdb_cli::{run, App, Cli};
use corpusdb_core::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_from(&cli.config).map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    let app = App::from_settings(settings)?;

    if !run(&app, cli.command, cli.json).await? {
        std::process::exit(1);
    }
    Ok(())
}
