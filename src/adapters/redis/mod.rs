//! Redis adapter.
//!
//! Provides a Redis-backed `RecordStore`: one JSON document per video plus
//! a set of all known ids.

mod error;
mod pool;
mod repository;

pub use error::RedisStoreError;
pub use pool::RedisRecordStore;

/// Redis key constants
const VIDEO_RECORD_PREFIX: &str = "reelindex:video:";
const VIDEO_INDEX_KEY: &str = "reelindex:videos";

fn record_key(local_id: &str) -> String {
    format!("{}{}", VIDEO_RECORD_PREFIX, local_id)
}
