use thiserror::Error;

/// Result type for spikegate operations
pub type Result<T> = std::result::Result<T, SpikegateError>;

/// Spikegate error types
#[derive(Error, Debug)]
pub enum SpikegateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
