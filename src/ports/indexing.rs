use crate::domain::task::TaskStatus;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote API answered with a non-2xx status.
    #[error("remote API error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The response body could not be understood.
    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(String),
}

/// A staged media file to forward to the indexing API.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexingApi: Send + Sync {
    /// Submit a media file for indexing. Returns the remote job handle.
    async fn submit(&self, upload: &MediaUpload, index_id: &str) -> Result<String, ApiError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusLookup: Send + Sync {
    /// Current status of a remote indexing job.
    async fn lookup(&self, remote_job_id: &str) -> Result<TaskStatus, ApiError>;
}
