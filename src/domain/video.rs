//! Video records and their indexing lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskMetadata;

/// Progress is advisory and never reaches 100 while a job is still running.
pub const PROGRESS_CAP: u8 = 95;

const DEFAULT_READY_SUMMARY: &str = "Video indexed successfully";

/// Indexing lifecycle of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Created locally, not (yet) accepted by the remote API
    #[default]
    Pending,
    /// Remote job accepted, waiting for a terminal status
    Indexing,
    /// Indexed and searchable
    Ready,
    /// Remote failure or timeout
    Failed,
}

impl VideoStatus {
    /// `Ready` and `Failed` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Indexing => "indexing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("video {local_id} is already {status}")]
    AlreadyTerminal { local_id: String, status: VideoStatus },

    #[error("video {local_id} has no remote job handle")]
    NotSubmitted { local_id: String },

    #[error("video {local_id} already has job handle {existing}")]
    JobAlreadyAssigned { local_id: String, existing: String },

    #[error("remote job handle must not be empty")]
    EmptyJobId,
}

/// A media asset tracked by the service, stored by `local_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Locally generated primary key
    pub local_id: String,
    pub title: String,
    /// Remote task handle, set once the upload is accepted
    pub remote_job_id: Option<String>,
    /// Remote content identifier, present iff `status` is `Ready`
    pub remote_content_id: Option<String>,
    pub status: VideoStatus,
    pub duration_seconds: f64,
    pub summary: String,
    /// Advisory percentage shown while indexing
    #[serde(default)]
    pub progress: u8,
    /// Remote index the video was submitted to
    #[serde(default)]
    pub index_id: Option<String>,
    /// Original upload file name
    #[serde(default)]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a new `Pending` record with a fresh local id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            local_id: Uuid::new_v4().to_string(),
            title: title.into(),
            remote_job_id: None,
            remote_content_id: None,
            status: VideoStatus::Pending,
            duration_seconds: 0.0,
            summary: "Uploading...".to_string(),
            progress: 0,
            index_id: None,
            file_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record the remote job handle and move to `Indexing`.
    pub fn mark_indexing(&mut self, remote_job_id: &str) -> Result<(), TransitionError> {
        if remote_job_id.is_empty() {
            return Err(TransitionError::EmptyJobId);
        }
        self.ensure_not_terminal()?;
        match &self.remote_job_id {
            Some(existing) if existing != remote_job_id => {
                return Err(TransitionError::JobAlreadyAssigned {
                    local_id: self.local_id.clone(),
                    existing: existing.clone(),
                });
            }
            Some(_) => {}
            None => self.remote_job_id = Some(remote_job_id.to_string()),
        }
        self.status = VideoStatus::Indexing;
        self.summary = "Indexing...".to_string();
        Ok(())
    }

    /// Terminal success: copy the indexing results onto the record.
    pub fn mark_ready(&mut self, metadata: TaskMetadata) -> Result<(), TransitionError> {
        self.ensure_submitted()?;
        self.ensure_not_terminal()?;

        self.status = VideoStatus::Ready;
        self.progress = 100;
        self.duration_seconds = metadata.duration_seconds.unwrap_or(0.0);
        self.summary = metadata
            .summary
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_READY_SUMMARY.to_string());
        if self.remote_content_id.is_none() {
            self.remote_content_id = Some(metadata.remote_content_id);
        }
        Ok(())
    }

    /// Terminal failure with a human-readable reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_submitted()?;
        self.ensure_not_terminal()?;

        self.status = VideoStatus::Failed;
        self.summary = reason.into();
        Ok(())
    }

    /// Store an advisory progress value. Never decreases and stays below 100.
    pub fn record_progress(&mut self, percent: u8) {
        if self.is_terminal() {
            return;
        }
        self.progress = self.progress.max(percent.min(PROGRESS_CAP));
    }

    fn ensure_not_terminal(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                local_id: self.local_id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_submitted(&self) -> Result<(), TransitionError> {
        if self.remote_job_id.is_none() {
            return Err(TransitionError::NotSubmitted {
                local_id: self.local_id.clone(),
            });
        }
        Ok(())
    }
}
