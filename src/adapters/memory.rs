//! In-process record store.

use crate::domain::video::VideoRecord;
use crate::ports::repository::{RecordStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// `RecordStore` backed by a shared `HashMap`. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, VideoRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: &VideoRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.local_id) {
            return Err(StoreError::Duplicate(record.local_id.clone()));
        }
        records.insert(record.local_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, local_id: &str) -> Result<Option<VideoRecord>, StoreError> {
        Ok(self.records.read().await.get(local_id).cloned())
    }

    async fn put(&self, record: &VideoRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.local_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, local_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(local_id).is_some())
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, StoreError> {
        let mut all: Vec<VideoRecord> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        Ok(all)
    }
}
