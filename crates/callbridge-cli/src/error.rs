//! Error handling for the CallBridge CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid driver configuration: {0}")]
    InvalidConfig(#[from] callbridge_core::ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    #[error("Run unit task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Figment(Box::new(err))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
