//! Configuration types for gpushare

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PluginConfig {
    /// Device sharing configuration
    pub sharing: SharingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl PluginConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, crate::GpushareError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::GpushareError::Config(format!("Failed to read config file: {}", e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::GpushareError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), crate::GpushareError> {
        if self.sharing.time_slicing.replicas == 0 {
            return Err(crate::GpushareError::Config(
                "time_slicing.replicas must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Device sharing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SharingConfig {
    /// Time-slicing settings
    pub time_slicing: TimeSlicingConfig,
}

/// Time-slicing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSlicingConfig {
    /// How replicas are handed out when devices are shared
    pub strategy: SharingStrategy,
    /// Replicas advertised per device when the inventory does not say otherwise
    pub replicas: usize,
}

impl Default for TimeSlicingConfig {
    fn default() -> Self {
        Self {
            strategy: SharingStrategy::None,
            replicas: 1,
        }
    }
}

/// Sharing strategy for replicated devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SharingStrategy {
    /// No sharing strategy configured
    #[default]
    None,
    /// Fill one device's replicas before moving to the next
    Packed,
    /// Spread replicas evenly across devices
    Distributed,
}

impl std::fmt::Display for SharingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharingStrategy::None => write!(f, "none"),
            SharingStrategy::Packed => write!(f, "packed"),
            SharingStrategy::Distributed => write!(f, "distributed"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log file path (if any)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
