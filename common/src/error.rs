use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Persistence error for {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FetchError {
    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        FetchError::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Request(format!("request timed out: {}", err))
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
