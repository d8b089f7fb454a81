use crate::domain::video::VideoRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoEvent {
    /// The remote API accepted the upload and polling started
    Submitted { local_id: String, remote_job_id: String },
    /// The video reached `Ready` or `Failed`
    Terminal(VideoRecord),
}

#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<VideoEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        // Capacity of 100 events should be sufficient for now
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers reached; an event
    /// with no subscribers is dropped.
    pub fn publish(&self, event: VideoEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VideoEvent> {
        self.sender.subscribe()
    }
}

/// Log every event until the hub is dropped.
pub fn spawn_logger(hub: &EventHub) -> tokio::task::JoinHandle<()> {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(VideoEvent::Submitted {
                    local_id,
                    remote_job_id,
                }) => {
                    tracing::info!(local_id = %local_id, remote_job_id = %remote_job_id, "Video submitted");
                }
                Ok(VideoEvent::Terminal(record)) => {
                    tracing::info!(
                        local_id = %record.local_id,
                        status = %record.status,
                        summary = %record.summary,
                        "Video indexing finished",
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
