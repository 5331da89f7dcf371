//! Machine geometry.
//!
//! Every component takes its dimensions from a [`MachineConfig`] at
//! construction, so differently shaped machines can live side by side.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Largest bank or word index a data-memory operand can encode (4 bits each).
pub const DATA_FIELD_LIMIT: usize = 16;

/// Immutable machine geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Words in the main (program) delay line.
    pub main_words: usize,
    /// Number of data bank channels.
    pub data_banks: usize,
    /// Words per data bank channel.
    pub bank_words: usize,
}

impl MachineConfig {
    pub const fn new(main_words: usize, data_banks: usize, bank_words: usize) -> Self {
        Self { main_words, data_banks, bank_words }
    }

    /// Check that the geometry can be built and addressed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main_words == 0 {
            return Err(ConfigError::EmptyMainMemory);
        }
        if self.data_banks == 0 || self.data_banks > DATA_FIELD_LIMIT {
            return Err(ConfigError::DataBanks(self.data_banks));
        }
        if self.bank_words == 0 || self.bank_words > DATA_FIELD_LIMIT {
            return Err(ConfigError::BankWords(self.bank_words));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: MachineConfig = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new(64, 4, 16)
    }
}

/// Errors in a machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("main memory must hold at least one word")]
    EmptyMainMemory,

    #[error("data bank count {0} out of range (1-16)")]
    DataBanks(usize),

    #[error("words per data bank {0} out of range (1-16)")]
    BankWords(usize),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MachineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert_eq!(MachineConfig::new(0, 4, 16).validate(), Err(ConfigError::EmptyMainMemory));
        assert_eq!(MachineConfig::new(8, 17, 16).validate(), Err(ConfigError::DataBanks(17)));
        assert_eq!(MachineConfig::new(8, 4, 0).validate(), Err(ConfigError::BankWords(0)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MachineConfig = serde_json::from_str(r#"{ "main_words": 32 }"#).unwrap();
        assert_eq!(config, MachineConfig::new(32, 4, 16));
    }
}
