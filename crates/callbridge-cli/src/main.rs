//! CallBridge CLI entry point

use clap::Parser;
use tracing::{error, info};

use callbridge_cli::{
    cli::{Cli, Commands},
    config::{AppConfig, LoggingConfig},
    error::Result,
    simulate::run_scenario,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize logging
    setup_logging(&config.logging, cli.verbose)?;

    if let Err(e) = execute(cli.command, &config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn execute(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Simulate { scenario } => {
            let report = run_scenario(scenario, &config.driver).await?;
            report.print();
            info!(%scenario, status = %report.status, "Simulation finished");
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

/// Setup logging from configuration; `--verbose` forces debug
fn setup_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        logging.max_level()?
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(logging.with_target)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
    Ok(())
}
