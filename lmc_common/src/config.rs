//! Configuration loading.
//!
//! Provides the [`ConfigLoader`] trait for reading any TOML-deserializable
//! type from disk, and [`load_config`] which additionally validates a
//! [`MachineConfig`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lmc_common::config::{load_config, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = load_config(Path::new("config/machine.toml"))?;
//!     println!("{} axes", config.axes.len());
//!     Ok(())
//! }
//! ```

use crate::machine::MachineConfig;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct can use ConfigLoader.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Load and validate a machine configuration file.
pub fn load_config(path: &Path) -> Result<MachineConfig, ConfigError> {
    debug!("Loading machine config from {}", path.display());
    let config = MachineConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a machine configuration from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<MachineConfig, ConfigError> {
    let config: MachineConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
