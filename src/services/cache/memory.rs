use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::client::{CacheClient, CacheError, CacheResult, CasOutcome};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process fallback cache, used when no external cache server is
/// configured (tests, single-instance deployments).
///
/// Unlike the original Mozilla `MemoryClient` (a plain dict with no TTL at
/// all), this implementation tracks real expiry per key: the filter's
/// threshold-recovery behaviour and the channel TTL both depend on entries
/// actually going away.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("value", &self.value).finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl: Duration) -> Option<Instant> {
        if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap();
        match map.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn add(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap();
        if let Some(entry) = map.get(key) {
            if entry.is_live(now) {
                return Ok(false);
            }
        }
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut map = self.inner.lock().unwrap();
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut map = self.inner.lock().unwrap();
        map.remove(key);
        Ok(true)
    }

    async fn incr(&self, key: &str) -> CacheResult<Option<i64>> {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap();
        let Some(entry) = map.get_mut(key) else {
            return Ok(None);
        };
        if !entry.is_live(now) {
            map.remove(key);
            return Ok(None);
        }
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| CacheError::InvalidValue(format!("non-integer value at {key}")))?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(Some(next))
    }

    async fn gets(&self, key: &str) -> CacheResult<Option<(String, String)>> {
        let value = self.get(key).await?;
        Ok(value.map(|v| (v.clone(), v)))
    }

    async fn cas(
        &self,
        key: &str,
        value: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<CasOutcome> {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap();
        let current = map.get(key).filter(|e| e.is_live(now)).map(|e| &e.value);
        if current.map(|v| v.as_str()) != Some(token) {
            return Ok(CasOutcome::Conflict);
        }
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(CasOutcome::Swapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_is_insert_if_absent() {
        let cache = MemoryCache::new();
        assert!(cache.add("k", "v1", Duration::ZERO).await.unwrap());
        assert!(!cache.add("k", "v2", Duration::ZERO).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_on_absent_key_returns_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_increments_existing_value() {
        let cache = MemoryCache::new();
        cache.set("k", "1", Duration::ZERO).await.unwrap();
        assert_eq!(cache.incr("k").await.unwrap(), Some(2));
        assert_eq!(cache.incr("k").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn cas_fails_on_stale_token() {
        let cache = MemoryCache::new();
        cache.set("k", "v1", Duration::ZERO).await.unwrap();
        let (_, token) = cache.gets("k").await.unwrap().unwrap();
        cache.set("k", "v2", Duration::ZERO).await.unwrap();
        let outcome = cache.cas("k", "v3", &token, Duration::ZERO).await.unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
        assert_eq!(cache.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn cas_succeeds_when_token_matches() {
        let cache = MemoryCache::new();
        cache.set("k", "v1", Duration::ZERO).await.unwrap();
        let (_, token) = cache.gets("k").await.unwrap().unwrap();
        let outcome = cache.cas("k", "v2", &token, Duration::ZERO).await.unwrap();
        assert_eq!(outcome, CasOutcome::Swapped);
        assert_eq!(cache.get("k").await.unwrap(), Some("v2".to_string()));
    }
}
