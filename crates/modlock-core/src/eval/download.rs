use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("downloads are disabled; cannot fetch {}", .urls.join(", "))]
    Offline { urls: Vec<String> },

    #[error("failed to download {url}: {message}")]
    Failed { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches remote files on behalf of extension implementations
pub trait Downloader: Send + Sync {
    /// Download the first reachable URL to `output`
    fn download(&self, urls: &[String], output: &Path) -> Result<(), DownloadError>;
}

/// Downloader that refuses every request
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineDownloader;

impl Downloader for OfflineDownloader {
    fn download(&self, urls: &[String], _output: &Path) -> Result<(), DownloadError> {
        Err(DownloadError::Offline { urls: urls.to_vec() })
    }
}
