use crate::domain::video::VideoRecord;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("video {0} already exists")]
    Duplicate(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable storage of video records keyed by `local_id`.
///
/// Values are returned by copy; a record may change in the store between
/// two reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a new record. Fails with `Duplicate` if the `local_id` is taken.
    async fn insert(&self, record: &VideoRecord) -> Result<(), StoreError>;

    /// Get a record by local id
    async fn get(&self, local_id: &str) -> Result<Option<VideoRecord>, StoreError>;

    /// Overwrite an existing record (or create it)
    async fn put(&self, record: &VideoRecord) -> Result<(), StoreError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, local_id: &str) -> Result<bool, StoreError>;

    /// All records, oldest first
    async fn list(&self) -> Result<Vec<VideoRecord>, StoreError>;
}
