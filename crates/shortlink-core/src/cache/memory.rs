//! In-memory session cache
//!
//! Entries live in a map behind a reader/writer lock together with their
//! deadline. Reads compare against the deadline themselves, so an entry
//! whose TTL elapsed is reported as missing even if the reaper has not
//! swept it yet. The reaper only bounds memory.

use super::{CacheError, SessionCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    deadline: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

fn deadline(now: Instant, ttl: Duration) -> Result<Instant, CacheError> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidTtl);
    }
    now.checked_add(ttl).ok_or(CacheError::InvalidTtl)
}

#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemorySessionCache {
    /// Create a cache without a reaper
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache and start sweeping it every `interval`
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_reaper(interval: Duration) -> Result<Arc<Self>, CacheError> {
        let cache = Arc::new(Self::new());
        Self::spawn_reaper(&cache, interval)?;
        Ok(cache)
    }

    /// Start the background sweep; it stops once the cache is dropped
    ///
    /// A zero `interval` is rejected up front, `tokio::time::interval`
    /// would panic inside the task.
    pub fn spawn_reaper(cache: &Arc<Self>, interval: Duration) -> Result<JoinHandle<()>, CacheError> {
        if interval.is_zero() {
            return Err(CacheError::InvalidInterval);
        }
        let weak: Weak<Self> = Arc::downgrade(cache);

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    tracing::trace!(purged, "Reaped expired session entries");
                }
            }
        }))
    }

    /// Drop every entry whose deadline has passed, returning how many went
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet reaped
    pub async fn raw_len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            deadline: deadline(Instant::now(), ttl)?,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .ok_or(CacheError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Duration, CacheError> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.deadline - now)
            .ok_or(CacheError::NotFound)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let new_deadline = deadline(now, ttl)?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.deadline = new_deadline;
                Ok(())
            }
            _ => Err(CacheError::NotFound),
        }
    }
}
