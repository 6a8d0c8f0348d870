use build_asset::commands::{self, RunOptions};
use build_asset::config::Cli;
use build_asset::SyncConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let options = RunOptions { quiet: cli.quiet };

    // Convert CLI args to SyncConfig - this validates immediately
    let config = SyncConfig::try_from(cli)?;
    tracing::debug!(
        input = %config.input_root().display(),
        destination = %config.destination_root().display(),
        mode = ?config.mode(),
        "configuration validated"
    );

    commands::run(config, options)?;
    Ok(())
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "build_asset=debug"
    } else if quiet {
        "build_asset=warn"
    } else {
        "build_asset=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
