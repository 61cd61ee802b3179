use thiserror::Error;

/// Errors raised while wiring or running the control layer
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] tinyupnp_model::ModelError),

    #[error("malformed callback header: {0}")]
    InvalidCallback(String),

    #[error("subscription table lock poisoned")]
    LockPoisoned,
}

/// Type alias for results that can return a [`ControlError`]
pub type Result<T> = std::result::Result<T, ControlError>;
