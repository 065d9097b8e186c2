
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OxapiError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid bounding box: {0}")]
    BBox(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, OxapiError>;

// Helper conversions
impl From<rusqlite::Error> for OxapiError {
    fn from(e: rusqlite::Error) -> Self { Self::Store(e.to_string()) }
}

impl From<std::io::Error> for OxapiError {
    fn from(e: std::io::Error) -> Self { Self::Store(e.to_string()) }
}
