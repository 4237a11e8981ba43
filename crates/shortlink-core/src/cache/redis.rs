//! Redis session cache
//!
//! One multiplexed connection shared by all requests. TTLs are kept in
//! milliseconds so sub-second lifetimes survive the round trip.

use super::{CacheError, SessionCache};
use ::redis::aio::MultiplexedConnection;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisSessionCache {
    connection: MultiplexedConnection,
}

impl RedisSessionCache {
    /// Connect to `url` and verify the server answers within `timeout`
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = ::redis::Client::open(url)?;

        let mut connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Backend(format!("Timed out connecting to {url}")))??;

        let pong: String = tokio::time::timeout(timeout, ::redis::cmd("PING").query_async(&mut connection))
            .await
            .map_err(|_| CacheError::Backend("Timed out waiting for PING".to_string()))??;

        tracing::debug!(reply = %pong, "Redis reachable");

        Ok(Self { connection })
    }
}

fn millis(ttl: Duration) -> Result<u64, CacheError> {
    match u64::try_from(ttl.as_millis()) {
        Ok(0) => Err(CacheError::InvalidTtl),
        Ok(ms) => Ok(ms),
        Err(_) => Ok(u64::MAX),
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = millis(ttl)?;
        let mut conn = self.connection.clone();

        let _: () = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let mut conn = self.connection.clone();

        let value: Option<Vec<u8>> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        value.ok_or(CacheError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        let _: i64 = ::redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Duration, CacheError> {
        let mut conn = self.connection.clone();

        // -2: no such key, -1: key without expiry
        let remaining: i64 = ::redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        match remaining {
            -2 => Err(CacheError::NotFound),
            ms if ms < 0 => Err(CacheError::Backend(format!("Key {key} has no expiry"))),
            ms => Ok(Duration::from_millis(ms.unsigned_abs())),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = millis(ttl)?;
        let mut conn = self.connection.clone();

        let updated: i64 = ::redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        if updated == 0 {
            return Err(CacheError::NotFound);
        }
        Ok(())
    }
}
