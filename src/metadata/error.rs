//! Metadata fetcher errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Transport(String),

    /// The page answered with a non-2xx status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Pattern error: {0}")]
    Pattern(String),
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MetadataError::Timeout
        } else {
            MetadataError::Transport(err.to_string())
        }
    }
}

impl From<regex::Error> for MetadataError {
    fn from(err: regex::Error) -> Self {
        MetadataError::Pattern(err.to_string())
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;
