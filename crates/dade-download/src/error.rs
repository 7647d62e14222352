//! Error types for the dataset downloader.

use std::path::PathBuf;

/// Errors that can occur while fetching or unpacking the dataset.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The HTTP request failed or the body stream broke off.
    #[error("request to {url} failed: {source}")]
    Http {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The status code received.
        status: reqwest::StatusCode,
    },

    /// A local file or directory operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An archive could not be unpacked.
    #[error("failed to extract {archive}: {source}")]
    Extract {
        /// The archive being unpacked.
        archive: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl DownloadError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
