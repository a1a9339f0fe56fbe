use std::time::Duration;
use thiserror::Error;

/// Unified error type for the display pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Catch-all for other errors
}

pub type Result<T> = std::result::Result<T, Error>;
