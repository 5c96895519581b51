use async_trait::async_trait;
use std::time::Duration;

use super::client::{CacheClient, CacheResult, CasOutcome};

/// Namespaces every key with a fixed string, so the channel store and the
/// filter's blacklist/counter store can share one backend without
/// collision. Thin pass-through otherwise.
#[derive(Clone, Debug)]
pub struct PrefixedCache<C> {
    inner: C,
    prefix: &'static str,
}

impl<C: CacheClient> PrefixedCache<C> {
    pub fn new(inner: C, prefix: &'static str) -> Self {
        Self { inner, prefix }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl<C: CacheClient> CacheClient for PrefixedCache<C> {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(&self.full_key(key)).await
    }

    async fn add(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        self.inner.add(&self.full_key(key), value, ttl).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        self.inner.set(&self.full_key(key), value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.inner.delete(&self.full_key(key)).await
    }

    async fn incr(&self, key: &str) -> CacheResult<Option<i64>> {
        self.inner.incr(&self.full_key(key)).await
    }

    async fn gets(&self, key: &str) -> CacheResult<Option<(String, String)>> {
        self.inner.gets(&self.full_key(key)).await
    }

    async fn cas(
        &self,
        key: &str,
        value: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<CasOutcome> {
        self.inner
            .cas(&self.full_key(key), value, token, ttl)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::memory::MemoryCache;

    #[tokio::test]
    async fn keys_are_namespaced() {
        let backend = MemoryCache::new();
        let prefixed = PrefixedCache::new(backend.clone(), "ns:");
        prefixed.set("a", "1", Duration::ZERO).await.unwrap();
        assert_eq!(backend.get("ns:a").await.unwrap(), Some("1".to_string()));
        assert_eq!(backend.get("a").await.unwrap(), None);
    }
}
