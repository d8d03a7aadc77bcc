//! Configuration for the auction module.
//!
//! Defines the validation limits applied to new auctions. Loaded from TOML;
//! every field has a default.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Limits applied by `create_auction`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionParams {
    /// Longest accepted item name, in characters
    pub max_item_name_len: usize,
    /// Longest accepted description, in characters
    pub max_description_len: usize,
    /// Shortest bidding window (milliseconds)
    pub min_duration_ms: u64,
    /// Longest bidding window (milliseconds)
    pub max_duration_ms: u64,
}

impl Default for AuctionParams {
    fn default() -> Self {
        Self {
            max_item_name_len: 64,
            max_description_len: 256,
            min_duration_ms: 60 * 1000,                 // 1 minute
            max_duration_ms: 30 * 24 * 60 * 60 * 1000, // 30 days
        }
    }
}

impl AuctionParams {
    /// Parse params from a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let params: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load params from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_item_name_len == 0 {
            return Err(ConfigError::Invalid(
                "Item name limit cannot be zero".into(),
            ));
        }
        if self.max_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "Maximum duration cannot be zero".into(),
            ));
        }
        if self.min_duration_ms > self.max_duration_ms {
            return Err(ConfigError::Invalid(
                "Minimum duration exceeds maximum duration".into(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
