use std::sync::Arc;

use serde::Serialize;

use crate::domain::search::{build_results, format_search_results, VideoSearchResult};
use crate::ports::indexing::ApiError;
use crate::ports::repository::{RecordStore, StoreError};
use crate::ports::search::SearchGateway;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Search results plus their text rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<VideoSearchResult>,
    pub formatted: String,
}

pub struct SearchService {
    gateway: Arc<dyn SearchGateway>,
    store: Arc<dyn RecordStore>,
    index_id: String,
}

impl SearchService {
    pub fn new(
        gateway: Arc<dyn SearchGateway>,
        store: Arc<dyn RecordStore>,
        index_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            index_id: index_id.into(),
        }
    }

    /// Query the index and join hits with local records.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let hits = self.gateway.search(query, &self.index_id).await?;
        let records = self.store.list().await?;
        let results = build_results(&hits, &records);
        tracing::info!(query, hits = hits.len(), results = results.len(), "Search finished");

        let formatted = format_search_results(&results);
        Ok(SearchOutcome { results, formatted })
    }
}
