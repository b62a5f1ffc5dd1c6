//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid connection bounds: floor {floor}, initial {initial}, ceiling {ceiling}")]
    InvalidConnectionBounds {
        floor: usize,
        initial: usize,
        ceiling: usize,
    },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("{name} must be between {min} and {max}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Invalid compression bounds: min {min}, initial {initial}, max {max}")]
    InvalidCompressionBounds { min: u8, initial: u8, max: u8 },

    #[error("Scale-down threshold must be below every scale-up threshold")]
    OverlappingThresholds,

    #[error("Invalid video API base URL")]
    InvalidVideoBaseUrl,
}
