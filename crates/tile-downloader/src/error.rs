//! Error types for tile downloads.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid download configuration: {0}")]
    Config(String),
}

impl DownloadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Network hiccups and server-side errors; client errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { source, .. } => !source.is_builder(),
            Self::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
