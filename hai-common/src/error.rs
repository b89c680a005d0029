//! Common error types for HealthAI

use thiserror::Error;

/// Common result type for HealthAI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across HealthAI services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
