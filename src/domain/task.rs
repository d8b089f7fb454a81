use serde::{Deserialize, Serialize};

pub const STATUS_READY: &str = "ready";
pub const STATUS_FAILED: &str = "failed";

const DEFAULT_FAILURE_MESSAGE: &str = "Indexing failed";

/// Results reported by the remote API once a task is ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub duration_seconds: Option<f64>,
    pub summary: Option<String>,
    pub remote_content_id: String,
}

/// One response of the remote task-status lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Raw remote status string ("validating", "indexing", "ready", ...)
    pub status: String,
    pub metadata: Option<TaskMetadata>,
    pub error_message: Option<String>,
}

/// What a lookup response means for the local record.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Processing { status: String },
    Ready(TaskMetadata),
    Failed { message: String },
}

impl TaskStatus {
    pub fn processing(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            metadata: None,
            error_message: None,
        }
    }

    pub fn ready(metadata: TaskMetadata) -> Self {
        Self {
            status: STATUS_READY.to_string(),
            metadata: Some(metadata),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILED.to_string(),
            metadata: None,
            error_message: Some(message.into()),
        }
    }

    /// Classify the response. Any status other than `ready`/`failed` is still processing.
    ///
    /// A `ready` response without a content identifier cannot satisfy the
    /// record invariants and is reported as a failure instead.
    pub fn observe(self) -> Observation {
        match self.status.as_str() {
            STATUS_READY => match self.metadata {
                Some(metadata) if !metadata.remote_content_id.is_empty() => {
                    Observation::Ready(metadata)
                }
                _ => Observation::Failed {
                    message: "Indexing finished without a content identifier".to_string(),
                },
            },
            STATUS_FAILED => Observation::Failed {
                message: self
                    .error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            },
            _ => Observation::Processing {
                status: self.status,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_statuses_are_processing() {
        for status in ["pending", "validating", "indexing", "READY", ""] {
            assert_eq!(
                TaskStatus::processing(status).observe(),
                Observation::Processing {
                    status: status.to_string()
                }
            );
        }
    }

    #[test]
    fn failed_carries_message_or_default() {
        assert_eq!(
            TaskStatus::failed("bad codec").observe(),
            Observation::Failed {
                message: "bad codec".to_string()
            }
        );

        let bare = TaskStatus {
            status: "failed".to_string(),
            metadata: None,
            error_message: None,
        };
        assert_eq!(
            bare.observe(),
            Observation::Failed {
                message: DEFAULT_FAILURE_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn ready_without_content_id_is_a_failure() {
        let status = TaskStatus {
            status: "ready".to_string(),
            metadata: None,
            error_message: None,
        };
        assert!(matches!(status.observe(), Observation::Failed { .. }));
    }
}
