//! Redis connection pool.

use super::error::RedisStoreError;
use deadpool_redis::{Config, Pool, Runtime};

/// Redis-backed record store.
#[derive(Clone)]
pub struct RedisRecordStore {
    pub(super) pool: Pool,
}

impl RedisRecordStore {
    /// Create a new store with a connection pool. Connections are opened lazily.
    pub fn new(redis_url: &str) -> Result<Self, RedisStoreError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }
}
