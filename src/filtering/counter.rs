use crate::services::cache::{CacheClient, CacheResult, ttl_seconds};

/// A TTL-bounded integer counter per source address (spec.md §3.3), used for
/// both call-rate and bad-request tracking.
#[derive(Clone)]
pub struct AddressCounter<C: CacheClient> {
    cache: C,
    prefix: &'static str,
    ttl_seconds: u64,
}

impl<C: CacheClient> AddressCounter<C> {
    pub fn new(cache: C, prefix: &'static str, ttl_seconds: u64) -> Self {
        Self {
            cache,
            prefix,
            ttl_seconds,
        }
    }

    fn key(&self, addr: &str) -> String {
        format!("{}:{}", self.prefix, addr)
    }

    /// Increments the counter and returns the new value. Per spec.md §9: if
    /// `incr` reports the key absent (fresh or ttl-expired), re-seed it with
    /// `1` and treat that as the result.
    pub async fn increment(&self, addr: &str) -> CacheResult<i64> {
        let key = self.key(addr);
        match self.cache.incr(&key).await? {
            Some(v) => Ok(v),
            None => {
                self.cache.set(&key, "1", ttl_seconds(self.ttl_seconds)).await?;
                Ok(1)
            }
        }
    }

    pub async fn count(&self, addr: &str) -> CacheResult<i64> {
        let raw = self.cache.get(&self.key(addr)).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn remove(&self, addr: &str) -> CacheResult<()> {
        self.cache.delete(&self.key(addr)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;
    use std::time::Duration;

    #[tokio::test]
    async fn increments_from_zero() {
        let counter = AddressCounter::new(MemoryCache::new(), "counter", 360);
        assert_eq!(counter.increment("1.2.3.4").await.unwrap(), 1);
        assert_eq!(counter.increment("1.2.3.4").await.unwrap(), 2);
        assert_eq!(counter.count("1.2.3.4").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recovers_after_ttl_expiry() {
        let cache = MemoryCache::new();
        let counter = AddressCounter::new(cache.clone(), "counter", 0);
        cache
            .set("counter:5.6.7.8", "9", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(counter.increment("5.6.7.8").await.unwrap(), 1);
    }
}
