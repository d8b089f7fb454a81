//! Redis RecordStore implementation.

use super::error::RedisStoreError;
use super::pool::RedisRecordStore;
use super::{record_key, VIDEO_INDEX_KEY};
use crate::domain::video::VideoRecord;
use crate::ports::repository::{RecordStore, StoreError};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn insert(&self, record: &VideoRecord) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let json = serde_json::to_string(record)?;

        // SET NX keeps local ids unique across processes
        let created: bool = conn
            .set_nx(record_key(&record.local_id), json)
            .await
            .map_err(RedisStoreError::from)?;
        if !created {
            return Err(StoreError::Duplicate(record.local_id.clone()));
        }
        conn.sadd::<_, _, ()>(VIDEO_INDEX_KEY, &record.local_id)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }

    async fn get(&self, local_id: &str) -> Result<Option<VideoRecord>, StoreError> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let json: Option<String> = conn
            .get(record_key(local_id))
            .await
            .map_err(RedisStoreError::from)?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, record: &VideoRecord) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let json = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(record_key(&record.local_id), json)
            .await
            .map_err(RedisStoreError::from)?;
        conn.sadd::<_, _, ()>(VIDEO_INDEX_KEY, &record.local_id)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }

    async fn delete(&self, local_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let removed: u64 = conn
            .del(record_key(local_id))
            .await
            .map_err(RedisStoreError::from)?;
        conn.srem::<_, _, ()>(VIDEO_INDEX_KEY, local_id)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, StoreError> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let ids: Vec<String> = conn
            .smembers(VIDEO_INDEX_KEY)
            .await
            .map_err(RedisStoreError::from)?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = conn
                .get(record_key(&id))
                .await
                .map_err(RedisStoreError::from)?;
            // Ids can outlive their record if a delete was interrupted
            if let Some(data) = json {
                records.push(serde_json::from_str::<VideoRecord>(&data)?);
            }
        }
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        Ok(records)
    }
}
