use anyhow::Result;
use bytes::Bytes;
use dashmap::DashMap;
use redis::{AsyncCommands, Client};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entry count at which `MemoryCache::set` first sweeps out expired entries.
const SWEEP_THRESHOLD: usize = 1024;

/// Response-body cache shared by every request handler. Entries are opaque
/// byte payloads with a per-entry time to live.
#[derive(Clone)]
pub enum PageCache {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl PageCache {
    pub async fn connect(redis_url: Option<&str>) -> Result<Self> {
        match redis_url {
            Some(url) => Ok(Self::Redis(RedisCache::connect(url).await?)),
            None => Ok(Self::Memory(MemoryCache::default())),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match self {
            Self::Memory(cache) => Ok(cache.get(key)),
            Self::Redis(cache) => cache.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        match self {
            Self::Memory(cache) => {
                cache.set(key, value, ttl);
                Ok(())
            }
            Self::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    /// Drops every entry whose key starts with `prefix`.
    pub async fn clear(&self, prefix: &str) -> Result<()> {
        match self {
            Self::Memory(cache) => {
                cache.clear(prefix);
                Ok(())
            }
            Self::Redis(cache) => cache.clear(prefix).await,
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Redis(cache) => cache.ping().await,
        }
    }
}

#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, (Instant, Bytes)>>,
    sweep_at: Arc<AtomicUsize>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            sweep_at: Arc::new(AtomicUsize::new(SWEEP_THRESHOLD)),
        }
    }
}

impl MemoryCache {
    pub fn get(&self, key: &str) -> Option<Bytes> {
        {
            let entry = self.entries.get(key)?;
            let (expires_at, value) = entry.value();
            if *expires_at > Instant::now() {
                return Some(value.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        if self.entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            self.sweep();
        }
        self.entries
            .insert(key.to_string(), (Instant::now() + ttl, value));
    }

    pub fn clear(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    // Next sweep once the map has doubled past what survived this one.
    fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (expires_at, _)| *expires_at > now);
        let next = (self.entries.len() * 2).max(SWEEP_THRESHOLD);
        self.sweep_at.store(next, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value.to_vec(), ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    pub async fn clear(&self, prefix: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
