//! Error type for configuration and storage operations

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
