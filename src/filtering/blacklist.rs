use std::time::Duration;

use crate::services::cache::{CacheClient, CacheError, CacheResult, CasOutcome, ttl_seconds};

const MEMBERS_KEY: &str = "blacklist";
const MAX_CAS_RETRIES: u32 = 10;
const NO_EXPIRY: Duration = Duration::ZERO;

/// Set of blocked source addresses with per-entry TTL (spec.md §3.3, §4.3).
///
/// An entry is "in the blacklist" iff its per-address TTL key is present.
/// The companion `blacklist` membership-set key is only consulted by the
/// administrative view and is reconciled lazily (spec.md §3.3: "eventually
/// consistent... until the next administrative listing prunes stale
/// entries").
#[derive(Clone)]
pub struct Blacklist<C: CacheClient> {
    cache: C,
}

impl<C: CacheClient> Blacklist<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    fn entry_key(addr: &str) -> String {
        format!("blacklist:{addr}")
    }

    pub async fn contains(&self, addr: &str) -> CacheResult<bool> {
        Ok(self.cache.get(&Self::entry_key(addr)).await?.is_some())
    }

    pub async fn add(&self, addr: &str, ttl_secs: u64) -> CacheResult<()> {
        self.cache
            .set(&Self::entry_key(addr), "1", ttl_seconds(ttl_secs))
            .await?;
        self.add_to_members(addr).await
    }

    pub async fn remove(&self, addr: &str) -> CacheResult<()> {
        self.cache.delete(&Self::entry_key(addr)).await?;
        self.remove_from_members(addr).await
    }

    /// Lists currently-blacklisted addresses for the administrative view,
    /// pruning any membership-set entries whose TTL already lapsed.
    pub async fn list(&self) -> CacheResult<Vec<String>> {
        let Some((value, token)) = self.cache.gets(MEMBERS_KEY).await? else {
            return Ok(Vec::new());
        };
        let members = split_members(&value);

        let mut live = Vec::with_capacity(members.len());
        for addr in &members {
            if self.contains(addr).await? {
                live.push(addr.clone());
            }
        }

        if live.len() != members.len() {
            // best-effort prune; a lost race just leaves stale entries for
            // the next listing to clean up.
            let _ = self
                .cache
                .cas(MEMBERS_KEY, &live.join(","), &token, NO_EXPIRY)
                .await;
        }

        Ok(live)
    }

    async fn add_to_members(&self, addr: &str) -> CacheResult<()> {
        for _ in 0..MAX_CAS_RETRIES {
            match self.cache.gets(MEMBERS_KEY).await? {
                None => {
                    if self.cache.add(MEMBERS_KEY, addr, NO_EXPIRY).await? {
                        return Ok(());
                    }
                    // someone else created the set first; retry via gets/cas.
                }
                Some((value, token)) => {
                    let mut members = split_members(&value);
                    if members.iter().any(|m| m == addr) {
                        return Ok(());
                    }
                    members.push(addr.to_string());
                    let new_value = members.join(",");
                    if self
                        .cache
                        .cas(MEMBERS_KEY, &new_value, &token, NO_EXPIRY)
                        .await?
                        == CasOutcome::Swapped
                    {
                        return Ok(());
                    }
                }
            }
        }
        Err(CacheError::BackendCommand(
            "blacklist membership cas exhausted retries".to_string(),
        ))
    }

    async fn remove_from_members(&self, addr: &str) -> CacheResult<()> {
        for _ in 0..MAX_CAS_RETRIES {
            let Some((value, token)) = self.cache.gets(MEMBERS_KEY).await? else {
                return Ok(());
            };
            let members: Vec<String> = split_members(&value)
                .into_iter()
                .filter(|m| m != addr)
                .collect();
            let new_value = members.join(",");
            if self
                .cache
                .cas(MEMBERS_KEY, &new_value, &token, NO_EXPIRY)
                .await?
                == CasOutcome::Swapped
            {
                return Ok(());
            }
        }
        Err(CacheError::BackendCommand(
            "blacklist membership cas exhausted retries".to_string(),
        ))
    }
}

fn split_members(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;

    #[tokio::test]
    async fn add_then_contains() {
        let bl = Blacklist::new(MemoryCache::new());
        assert!(!bl.contains("1.2.3.4").await.unwrap());
        bl.add("1.2.3.4", 360).await.unwrap();
        assert!(bl.contains("1.2.3.4").await.unwrap());
        assert_eq!(bl.list().await.unwrap(), vec!["1.2.3.4".to_string()]);
    }

    #[tokio::test]
    async fn remove_clears_membership_and_entry() {
        let bl = Blacklist::new(MemoryCache::new());
        bl.add("1.2.3.4", 360).await.unwrap();
        bl.add("5.6.7.8", 360).await.unwrap();
        bl.remove("1.2.3.4").await.unwrap();
        assert!(!bl.contains("1.2.3.4").await.unwrap());
        assert_eq!(bl.list().await.unwrap(), vec!["5.6.7.8".to_string()]);
    }

    #[tokio::test]
    async fn unblocking_unknown_address_is_a_no_op() {
        let bl = Blacklist::new(MemoryCache::new());
        bl.remove("nowhere").await.unwrap();
    }

    #[tokio::test]
    async fn list_prunes_ttl_expired_entries() {
        let cache = MemoryCache::new();
        let bl = Blacklist::new(cache.clone());
        bl.add("1.2.3.4", 0).await.unwrap();
        // TTL of 0 means "no expiry" in our cache contract, so simulate
        // expiry by deleting the per-entry TTL key directly, as if it had
        // lapsed, while membership-set bookkeeping still lists it.
        cache.delete("blacklist:1.2.3.4").await.unwrap();
        assert_eq!(bl.list().await.unwrap(), Vec::<String>::new());
    }
}
