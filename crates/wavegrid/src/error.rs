//! Error types for acoustic grid simulation.
//!
//! Only contract violations surface here. Runtime data conditions such as an
//! unknown emitter or a position outside the grid are reported through the
//! sentinel in [`crate::context::AcousticOutput`] instead.

use thiserror::Error;

/// Result type for wavegrid operations.
pub type Result<T> = std::result::Result<T, WaveGridError>;

/// Errors that can occur while configuring or running a simulation.
#[derive(Error, Debug)]
pub enum WaveGridError {
    /// Configuration violates a structural or stability contract.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested execution back-end is declared but not available.
    #[error("Unsupported execution type: {0}")]
    UnsupportedExecution(String),

    /// Scene geometry cannot be mapped onto the grid.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Configuration file could not be decoded.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaveGridError {
    /// Create an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an unsupported execution error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedExecution(msg.into())
    }

    /// Create an invalid geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create a worker pool error.
    pub fn worker_pool(msg: impl Into<String>) -> Self {
        Self::WorkerPool(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WaveGridError::unsupported("gpu");
        assert_eq!(err.to_string(), "Unsupported execution type: gpu");

        let err = WaveGridError::config("cell_size must be positive");
        assert!(err.to_string().contains("cell_size"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("width = [");
        let err: WaveGridError = parse.unwrap_err().into();
        assert!(matches!(err, WaveGridError::ConfigParse(_)));
    }
}
