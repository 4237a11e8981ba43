//! Session cache
//!
//! A keyed store with per-entry TTL. Expiry is enforced by the store
//! itself: once an entry's TTL elapses, `get` reports `NotFound` without
//! anybody deleting it. Every operation is atomic for its single key.

mod memory;
mod redis;

pub use self::memory::MemorySessionCache;
pub use self::redis::RedisSessionCache;

use crate::config::{CacheBackend, CacheConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is absent or its TTL has elapsed
    #[error("Cache entry not found")]
    NotFound,

    #[error("TTL must be positive and representable")]
    InvalidTtl,

    #[error("Reaper interval must be positive")]
    InvalidInterval,

    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<::redis::RedisError> for CacheError {
    fn from(err: ::redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Storage contract for session records
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry and its TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;

    /// Remove `key`; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remaining lifetime of `key`
    async fn ttl(&self, key: &str) -> Result<Duration, CacheError>;

    /// Reset the lifetime of an existing `key` to `ttl`
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Build the configured session cache backend
pub async fn build_session_cache(config: &CacheConfig) -> Result<Arc<dyn SessionCache>, CacheError> {
    let cache: Arc<dyn SessionCache> = match config.backend {
        CacheBackend::Memory => MemorySessionCache::with_reaper(config.reaper_interval())?,
        CacheBackend::Redis => {
            Arc::new(RedisSessionCache::connect(&config.redis_url, config.connect_timeout()).await?)
        }
    };

    tracing::info!(backend = ?config.backend, "Session cache ready");
    Ok(cache)
}
