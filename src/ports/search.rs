use super::indexing::ApiError;
use crate::domain::search::SearchHit;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Run a query against an index. Hits are grouped per remote video.
    async fn search(&self, query: &str, index_id: &str) -> Result<Vec<SearchHit>, ApiError>;
}
