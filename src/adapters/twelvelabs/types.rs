//! Twelve Labs wire types and their mapping onto domain types.

use crate::domain::search::{SearchHit, Segment};
use crate::domain::task::{TaskMetadata, TaskStatus};
use serde::Deserialize;
use serde_json::Value;

/// Response of `POST /tasks`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireMetadata {
    pub duration: Option<f64>,
    pub summary: Option<String>,
}

/// Response of `GET /tasks/{task_id}`.
#[derive(Debug, Deserialize)]
pub struct TaskResponse {
    pub status: String,
    pub video_id: Option<String>,
    pub metadata: Option<WireMetadata>,
    pub system_metadata: Option<WireMetadata>,
    pub error: Option<Value>,
    pub message: Option<String>,
}

impl From<TaskResponse> for TaskStatus {
    fn from(resp: TaskResponse) -> Self {
        let metadata = resp.video_id.filter(|id| !id.is_empty()).map(|video_id| {
            let meta = resp.metadata.unwrap_or_default();
            let system = resp.system_metadata.unwrap_or_default();
            TaskMetadata {
                duration_seconds: meta.duration.or(system.duration),
                summary: meta.summary,
                remote_content_id: video_id,
            }
        });
        let error_message = resp.error.as_ref().and_then(error_text).or(resp.message);

        TaskStatus {
            status: resp.status,
            metadata,
            error_message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireClip {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub score: Option<f64>,
    pub confidence: Option<String>,
}

/// One entry of the search `data` array. Grouped searches carry `id` and
/// `clips`; ungrouped ones carry `video_id` and the clip fields inline.
#[derive(Debug, Deserialize)]
pub struct WireSearchItem {
    pub id: Option<String>,
    pub video_id: Option<String>,
    pub clips: Option<Vec<WireClip>>,
    #[serde(flatten)]
    pub inline: WireClip,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<WireSearchItem>,
}

impl SearchResponse {
    pub fn into_hits(self) -> Vec<SearchHit> {
        self.data
            .into_iter()
            .filter_map(|item| {
                let remote_content_id = item.id.or(item.video_id)?;
                let segments = match item.clips {
                    Some(clips) => clips.into_iter().map(segment).collect(),
                    None if item.inline.score.is_some() => vec![segment(item.inline)],
                    None => Vec::new(),
                };
                Some(SearchHit {
                    remote_content_id,
                    segments,
                })
            })
            .collect()
    }
}

fn segment(clip: WireClip) -> Segment {
    Segment {
        start_time: clip.start.unwrap_or(0.0),
        end_time: clip.end.unwrap_or(0.0),
        score: clip.score.unwrap_or(0.0),
        confidence: clip.confidence,
    }
}

/// Extract a message from an error body (`{"message": ...}` or `{"error": ...}`).
pub fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(error_text),
        _ => None,
    }
}
