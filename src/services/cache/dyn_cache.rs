use async_trait::async_trait;
use std::time::Duration;

use super::client::{CacheClient, CacheResult, CasOutcome};
use super::{MemoryCache, RedisCache};

/// Runtime choice of cache backend, selected once at startup from
/// `Config::cache_url` (spec.md §6.2, `keyexchange.use_memory`).
///
/// An enum rather than a trait object so every caller keeps working with a
/// plain, cheap-to-clone, `Sized` type.
#[derive(Clone, Debug)]
pub enum Cache {
    Redis(RedisCache),
    Memory(MemoryCache),
}

#[async_trait]
impl CacheClient for Cache {
    fn backend_name(&self) -> &'static str {
        match self {
            Cache::Redis(c) => c.backend_name(),
            Cache::Memory(c) => c.backend_name(),
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Cache::Redis(c) => c.get(key).await,
            Cache::Memory(c) => c.get(key).await,
        }
    }

    async fn add(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        match self {
            Cache::Redis(c) => c.add(key, value, ttl).await,
            Cache::Memory(c) => c.add(key, value, ttl).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        match self {
            Cache::Redis(c) => c.set(key, value, ttl).await,
            Cache::Memory(c) => c.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self {
            Cache::Redis(c) => c.delete(key).await,
            Cache::Memory(c) => c.delete(key).await,
        }
    }

    async fn incr(&self, key: &str) -> CacheResult<Option<i64>> {
        match self {
            Cache::Redis(c) => c.incr(key).await,
            Cache::Memory(c) => c.incr(key).await,
        }
    }

    async fn gets(&self, key: &str) -> CacheResult<Option<(String, String)>> {
        match self {
            Cache::Redis(c) => c.gets(key).await,
            Cache::Memory(c) => c.gets(key).await,
        }
    }

    async fn cas(
        &self,
        key: &str,
        value: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<CasOutcome> {
        match self {
            Cache::Redis(c) => c.cas(key, value, token, ttl).await,
            Cache::Memory(c) => c.cas(key, value, token, ttl).await,
        }
    }
}
