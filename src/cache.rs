//! Named-blob cache used by the recipe listing.
//!
//! - `MemoryCache`: single-instance mode, a map inside the process
//! - `RedisCache`: shared across instances through a Redis server
//!
//! A missing key is `Ok(None)`, never an error. Deleting a missing key succeeds.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::CacheError;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    /// Store `value` under `key`; `None` keeps it until deleted.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.data.clone()));
            }
        }
        // Guard from `get` is dropped here; `remove_if` under it deadlocks the shard.
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = Entry {
            data: value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed cache. The connection manager reconnects on its own and is
/// cloned per command.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(addr: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(addr)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(addr = %addr, "connected to redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
