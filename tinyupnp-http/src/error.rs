use thiserror::Error;

/// Errors raised by the HTTP server
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("unsupported method '{0}'")]
    UnsupportedMethod(String),
}

/// Type alias for results that can return an [`HttpError`]
pub type Result<T> = std::result::Result<T, HttpError>;
