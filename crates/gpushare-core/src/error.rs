//! Error types for gpushare

use thiserror::Error;

/// Main error type for gpushare
#[derive(Error, Debug)]
pub enum GpushareError {
    /// A device ID could not be resolved against the topology graph
    #[error("Invalid device list: {0}")]
    InvalidDeviceList(String),

    /// Not enough candidate devices to satisfy the request
    #[error("Not enough available devices to satisfy allocation: requested {requested}, available {available}")]
    InsufficientDevices { requested: usize, available: usize },

    /// Devices are shared but no sharing strategy is configured
    #[error("No valid allocation policy selected")]
    NoValidPolicy,

    /// Request violates the caller contract
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for gpushare operations
pub type GpushareResult<T> = Result<T, GpushareError>;

impl From<toml::de::Error> for GpushareError {
    fn from(err: toml::de::Error) -> Self {
        GpushareError::Config(err.to_string())
    }
}
