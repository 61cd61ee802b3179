use thiserror::Error;

/// Errors raised by the discovery layer
#[derive(Debug, Error)]
pub enum SsdpError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for results that can return an [`SsdpError`]
pub type Result<T> = std::result::Result<T, SsdpError>;
