//! Command-line interface definitions and parsing

use crate::simulate::Scenario;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one scripted call and print the recorded transport events
    Simulate {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: Scenario,
    },
    /// Print the effective configuration
    Config,
}
