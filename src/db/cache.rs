// db/cache.rs
//! Cache abstraction shared by the reconciliation engine and the gateway
//! balance lookup.
//!
//! Values are JSON strings stored under a key with a TTL. The Redis backend is
//! safe to share between several service instances; the in-memory backend is
//! process-local and only suitable for a single instance or for tests. Either
//! way the cache is an optimization: callers must cope with misses and errors.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every key owned by this cache.
    async fn invalidate_all(&self) -> Result<(), CacheError>;

    fn backend(&self) -> &'static str;
}

/// Typed, best-effort helpers on top of [`CacheStore`]. Failures are logged
/// and reported as a miss (or ignored on write).
pub struct CacheHelper;

impl CacheHelper {
    /// Generic get from cache
    pub async fn get<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
        match cache.get_raw(key).await {
            Ok(Some(data)) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    tracing::debug!("Cache HIT: {}", key);
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!("Cache deserialization failed for {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                tracing::debug!("Cache MISS: {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Generic set to cache with TTL
    pub async fn set<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Cache serialization failed for {}: {}", key, e);
                return;
            }
        };

        match cache.set_raw(key, json, ttl).await {
            Ok(()) => tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl.as_secs()),
            Err(e) => tracing::warn!("Cache write failed for {}: {}", key, e),
        }
    }

    /// Delete a cache key
    pub async fn delete(cache: &dyn CacheStore, key: &str) {
        match cache.invalidate(key).await {
            Ok(()) => tracing::debug!("Cache DELETE: {}", key),
            Err(e) => tracing::warn!("Cache delete failed for {}: {}", key, e),
        }
    }
}

/// Redis-backed cache. Every key is stored under `namespace`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(cached)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SET EX rejects a zero expiry
        let seconds = ttl.as_secs().max(1) as usize;
        let _: () = conn.set_ex(self.namespaced(key), value, seconds).await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.namespace);
        let mut cursor: u64 = 0;
        let mut deleted_count = 0;

        loop {
            // SCAN instead of KEYS so Redis is never blocked
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                deleted_count += keys.len();
                let _: () = conn.del(&keys).await?;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        tracing::debug!("Cache DELETE pattern: {} ({} keys)", pattern, deleted_count);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache. Not shared between instances.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries().insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries().remove(key);
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        self.entries().clear();
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
