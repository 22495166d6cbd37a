//! CallBridge CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! defaults, then the TOML file (`callbridge.toml` or `--config`), then
//! `CALLBRIDGE_*` environment variables. Nested keys use `__` in variable names,
//! e.g. `CALLBRIDGE_DRIVER__UNARY_REQUEST_CREDIT=3`.

use std::path::Path;
use std::str::FromStr;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use callbridge_core::DriverConfig;

use crate::error::{CliError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "callbridge.toml";
pub const ENV_PREFIX: &str = "CALLBRIDGE_";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Call driver flow control
    pub driver: DriverConfig,

    /// Logging output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    /// Include the event target in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<tracing::Level> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| CliError::Config(format!("unknown log level '{}'", self.level)))
    }
}

impl AppConfig {
    fn figment(path: Option<&str>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()));
        let figment = match path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(CliError::Config(format!(
                        "configuration file not found: {}",
                        path
                    )));
                }
                figment.merge(Toml::file(path))
            }
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate configuration
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config: AppConfig = Self::figment(path)?.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.driver.validate()?;
        self.logging.max_level()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
