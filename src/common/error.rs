use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame stream error: {0}")]
    Stream(String),

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FaceGateError>;
