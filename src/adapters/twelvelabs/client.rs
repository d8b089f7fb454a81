//! REST client for the Twelve Labs API.

use super::types::{error_text, SearchResponse, SubmitResponse, TaskResponse};
use crate::domain::search::SearchHit;
use crate::domain::task::TaskStatus;
use crate::ports::indexing::{ApiError, IndexingApi, MediaUpload, StatusLookup};
use crate::ports::search::SearchGateway;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

const API_KEY_HEADER: &str = "x-api-key";

/// Fixed search parameters; only visual matching is requested.
const SEARCH_OPTIONS: &str = "visual";
const SEARCH_PAGE_LIMIT: &str = "10";

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// HTTP client for one Twelve Labs account.
#[derive(Clone)]
pub struct TwelveLabsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TwelveLabsClient {
    /// * `base_url` - API root, e.g. `https://api.twelvelabs.io/v1.3`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `tasks/{id}` with the id percent-encoded as a single path segment.
    fn task_url(&self, remote_job_id: &str) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.url("tasks"))
            .map_err(|e| ApiError::Transport(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("invalid base URL: {}", self.base_url)))?
            .push(remote_job_id);
        Ok(url)
    }

    /// Turn a non-2xx response into [`ApiError::Remote`], preferring the
    /// body's `message`/`error` field over the raw text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| error_text(&v))
            .unwrap_or(body);
        Err(ApiError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl IndexingApi for TwelveLabsClient {
    async fn submit(&self, upload: &MediaUpload, index_id: &str) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(&upload.path)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;

        let mut part = Part::bytes(bytes).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ApiError::Decode(e.to_string()))?;
        }
        let form = Form::new()
            .text("index_id", index_id.to_string())
            .part("video_file", part);

        let response = self
            .client
            .post(self.url("tasks"))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::info!(task_id = %submitted.id, index_id, "Video submitted for indexing");
        Ok(submitted.id)
    }
}

#[async_trait]
impl StatusLookup for TwelveLabsClient {
    async fn lookup(&self, remote_job_id: &str) -> Result<TaskStatus, ApiError> {
        let response = self
            .client
            .get(self.task_url(remote_job_id)?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let task: TaskResponse = Self::parse_response(response).await?;
        Ok(task.into())
    }
}

#[async_trait]
impl SearchGateway for TwelveLabsClient {
    async fn search(&self, query: &str, index_id: &str) -> Result<Vec<SearchHit>, ApiError> {
        let form = Form::new()
            .text("index_id", index_id.to_string())
            .text("query_text", query.to_string())
            .text("search_options", SEARCH_OPTIONS)
            .text("group_by", "video")
            .text("threshold", "low")
            .text("sort_option", "score")
            .text("page_limit", SEARCH_PAGE_LIMIT);

        let response = self
            .client
            .post(self.url("search"))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let results: SearchResponse = Self::parse_response(response).await?;
        let hits = results.into_hits();
        tracing::debug!(query, hits = hits.len(), "Search completed");
        Ok(hits)
    }
}
