use thiserror::Error;

/// Errors raised while composing or running a device
#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Model(#[from] tinyupnp_model::ModelError),

    #[error(transparent)]
    Http(#[from] tinyupnp_http::HttpError),

    #[error(transparent)]
    Control(#[from] tinyupnp_control::ControlError),

    #[error(transparent)]
    Ssdp(#[from] tinyupnp_ssdp::SsdpError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for results that can return an [`SdkError`]
pub type Result<T> = std::result::Result<T, SdkError>;
