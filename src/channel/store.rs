use md5::{Digest, Md5};
use std::net::IpAddr;
use std::time::Duration;

use super::error::ChannelError;
use super::record::{ChannelRecord, now_epoch};
use crate::services::cache::{CacheClient, PrefixedCache, ttl_seconds};
use crate::services::cef::{self, Signature};

/// Fixed-length client identity carried on every request but the health
/// check (spec.md §3.2).
pub fn is_valid_client_id(client_id: Option<&str>) -> bool {
    matches!(client_id, Some(s) if s.len() == 256)
}

fn get_counter_key(cid: &str) -> String {
    format!("GET:{cid}")
}

/// Result of a successful `get_channel` call.
pub struct ChannelPayload {
    pub body: Vec<u8>,
    pub etag: String,
}

/// The channel engine: identifier allocation, occupancy, payload storage,
/// entity tags, conditional GET, bounded GET-count eviction, explicit
/// deletion, report, health check (spec.md §4.2).
#[derive(Clone)]
pub struct ChannelStore<C: CacheClient> {
    cache: PrefixedCache<C>,
    cid_len: usize,
    ttl_seconds: u64,
    max_gets: i64,
}

impl<C: CacheClient> ChannelStore<C> {
    pub fn new(cache: C, cid_len: usize, ttl_seconds: u64, max_gets: i64) -> Self {
        Self {
            cache: PrefixedCache::new(cache, "keyexchange:"),
            cid_len,
            ttl_seconds,
            max_gets,
        }
    }

    async fn load(&self, cid: &str) -> Result<Option<ChannelRecord>, ChannelError> {
        let Some(raw) = self.cache.get(cid).await? else {
            return Ok(None);
        };
        let record: ChannelRecord =
            serde_json::from_str(&raw).map_err(|_| ChannelError::Unavailable)?;
        if record.is_expired() {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn store(&self, cid: &str, record: &ChannelRecord) -> Result<(), ChannelError> {
        let raw = serde_json::to_string(record).map_err(|_| ChannelError::Unavailable)?;
        let ok = self
            .cache
            .set(cid, &raw, ttl_seconds(record.remaining_ttl_secs()))
            .await?;
        if ok {
            Ok(())
        } else {
            Err(ChannelError::Unavailable)
        }
    }

    /// `GET /new_channel`. Allocates a fresh cid by random draw, retrying up
    /// to 100 times on collision.
    pub async fn create(&self, creator_id: &str) -> Result<String, ChannelError> {
        let ttl = now_epoch() + self.ttl_seconds;
        let record = ChannelRecord::new(creator_id, ttl);
        let raw = serde_json::to_string(&record).map_err(|_| ChannelError::Unavailable)?;

        for _ in 0..100 {
            let cid = crate::services::cid::generate_cid(self.cid_len);
            if self
                .cache
                .add(&cid, &raw, ttl_seconds(self.ttl_seconds))
                .await?
            {
                return Ok(cid);
            }
        }
        Err(ChannelError::Unavailable)
    }

    /// Implicit join/bind performed on every non-create, non-report
    /// operation (spec.md §4.2 "Join / bind").
    pub async fn bind(
        &self,
        cid: &str,
        client_id: Option<&str>,
        source: Option<IpAddr>,
    ) -> Result<ChannelRecord, ChannelError> {
        if !is_valid_client_id(client_id) {
            cef::log_failure(
                &format!("Invalid X-KeyExchange-Id value for channel \"{cid}\""),
                Signature::InvalidClientId,
                source,
            );
            self.delete_best_effort(cid, source).await;
            return Err(ChannelError::BadRequest("invalid client id"));
        }
        let client_id = client_id.expect("validated above");

        if !crate::services::cid::is_valid_cid_shape(cid) {
            cef::log_failure(
                "Requested an invalid channel id",
                Signature::InvalidChannelId,
                source,
            );
            return Err(ChannelError::NotFound);
        }

        let Some(mut record) = self.load(cid).await? else {
            cef::log_failure(
                "Requested an invalid channel id",
                Signature::InvalidChannelId,
                source,
            );
            return Err(ChannelError::NotFound);
        };

        if record.ids.len() < 2 {
            if !record.ids.iter().any(|id| id == client_id) {
                record.ids.push(client_id.to_string());
                self.store(cid, &record).await?;
            }
            Ok(record)
        } else if record.ids.iter().any(|id| id == client_id) {
            Ok(record)
        } else {
            cef::log_failure(
                &format!("Unknown X-KeyExchange-Id value for channel \"{cid}\""),
                Signature::UnknownClientId,
                source,
            );
            self.delete_best_effort(cid, source).await;
            Err(ChannelError::BadRequest("unknown client id"))
        }
    }

    /// `PUT /{cid}`. Replaces `body`, recomputes the etag.
    pub async fn put(
        &self,
        cid: &str,
        mut record: ChannelRecord,
        body: &[u8],
    ) -> Result<String, ChannelError> {
        use base64::Engine as _;
        let etag = compute_etag(body.len());
        record.body_b64 = base64::engine::general_purpose::STANDARD.encode(body);
        record.etag = Some(etag.clone());
        self.store(cid, &record).await?;
        Ok(etag)
    }

    /// `GET /{cid}`, honouring `If-None-Match` and advancing the GET counter.
    pub async fn get(
        &self,
        cid: &str,
        record: ChannelRecord,
        if_none_match: Option<&str>,
    ) -> Result<ChannelPayload, ChannelError> {
        use base64::Engine as _;

        let etag = record.etag.clone().unwrap_or_default();
        if if_none_match.is_some_and(|inm| etag_set_contains(inm, &etag)) {
            return Err(ChannelError::NotModified);
        }

        let body = base64::engine::general_purpose::STANDARD
            .decode(&record.body_b64)
            .map_err(|_| ChannelError::Unavailable)?;

        let ckey = get_counter_key(cid);
        let current = self.cache.get(&ckey).await?;
        let mut evict = false;
        match current {
            None => {
                self.cache
                    .set(&ckey, "1", ttl_seconds(record.remaining_ttl_secs()))
                    .await?;
            }
            Some(raw) => {
                let count: i64 = raw.parse().unwrap_or(0);
                if count + 1 >= self.max_gets {
                    evict = true;
                } else {
                    self.cache.incr(&ckey).await?;
                }
            }
        }

        if evict {
            self.delete(cid).await?;
        }

        Ok(ChannelPayload { body, etag })
    }

    /// `DELETE /{cid}`. Idempotent: an already-absent channel is success too.
    pub async fn delete(&self, cid: &str) -> Result<(), ChannelError> {
        let _ = self.cache.delete(&get_counter_key(cid)).await;
        if self.cache.get(cid).await?.is_none() {
            return Ok(());
        }
        if self.cache.delete(cid).await? {
            Ok(())
        } else {
            Err(ChannelError::Unavailable)
        }
    }

    /// Best-effort delete used on protocol-violation paths: failure is
    /// logged and swallowed so the original error still surfaces.
    async fn delete_best_effort(&self, cid: &str, source: Option<IpAddr>) {
        if self.delete(cid).await.is_err() {
            cef::log_failure(
                &format!("Could not delete channel \"{cid}\""),
                Signature::DeleteLog,
                source,
            );
        }
    }

    /// `POST /report`.
    pub async fn report(
        &self,
        client_id: Option<&str>,
        target_cid: Option<&str>,
        log_header: &str,
        body: &[u8],
        source: Option<IpAddr>,
    ) -> Result<(), ChannelError> {
        let truncated = &body[..body.len().min(2000)];
        let message = format!("{log_header}\n{}", String::from_utf8_lossy(truncated));
        cef::log_failure(&message, Signature::Report, source);

        if let (Some(client_id), Some(cid)) = (client_id, target_cid) {
            if let Some(record) = self.load(cid).await? {
                if record.ids.iter().any(|id| id == client_id) {
                    self.delete_best_effort(cid, source).await;
                }
            }
        }
        Ok(())
    }

    /// Probes the cache the way `/` does before redirecting.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let key = format!("health_check_{}", crate::services::cid::generate_cid(16));
        if !self.cache.add(&key, "ok", ttl_seconds(30)).await? {
            return Err(ChannelError::Unavailable);
        }
        if self.cache.get(&key).await?.as_deref() != Some("ok") {
            return Err(ChannelError::Unavailable);
        }
        self.cache.delete(&key).await?;
        if self.cache.get(&key).await?.is_some() {
            return Err(ChannelError::Unavailable);
        }
        Ok(())
    }
}

/// `md5("{len(body)}:{iso(now)}")`, truncated to second resolution so two
/// writes within the same second and same length collide, as spec.md §4.2
/// documents.
fn compute_etag(body_len: usize) -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let input = format!("{body_len}:{now}");
    let digest = Md5::digest(input.as_bytes());
    format!("{digest:x}")
}

/// `If-None-Match` may carry a comma-separated list of quoted etags, or `*`.
fn etag_set_contains(header_value: &str, etag: &str) -> bool {
    if header_value.trim() == "*" {
        return true;
    }
    header_value
        .split(',')
        .map(|part| part.trim().trim_matches('"'))
        .any(|part| part == etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;

    fn store() -> ChannelStore<MemoryCache> {
        ChannelStore::new(MemoryCache::new(), 4, 300, 6)
    }

    fn cid256(tag: &str) -> String {
        format!("{tag:0<256}").chars().take(256).collect()
    }

    #[tokio::test]
    async fn create_allocates_a_cid_of_configured_length() {
        let store = store();
        let alice = cid256("a");
        let cid = store.create(&alice).await.unwrap();
        assert_eq!(cid.len(), 4);
    }

    #[tokio::test]
    async fn two_party_rendezvous_round_trip() {
        let store = store();
        let alice = cid256("a");
        let bob = cid256("b");

        let cid = store.create(&alice).await.unwrap();

        let record = store.bind(&cid, Some(&alice), None).await.unwrap();
        let etag1 = store.put(&cid, record, b"msg1").await.unwrap();

        let record = store.bind(&cid, Some(&bob), None).await.unwrap();
        assert_eq!(record.ids, vec![alice.clone(), bob.clone()]);
        let payload = store.get(&cid, record, None).await.unwrap();
        assert_eq!(payload.body, b"msg1");
        assert_eq!(payload.etag, etag1);

        let record = store.bind(&cid, Some(&bob), None).await.unwrap();
        let etag2 = store.put(&cid, record, b"msg2").await.unwrap();

        let record = store.bind(&cid, Some(&alice), None).await.unwrap();
        let payload = store
            .get(&cid, record.clone(), Some(&etag1))
            .await
            .unwrap();
        assert_eq!(payload.body, b"msg2");

        let err = store.get(&cid, record, Some(&etag2)).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotModified));
    }

    #[tokio::test]
    async fn third_party_join_is_rejected_and_destroys_channel() {
        let store = store();
        let alice = cid256("a");
        let bob = cid256("b");
        let carol = cid256("c");

        let cid = store.create(&alice).await.unwrap();
        store.bind(&cid, Some(&bob), None).await.unwrap();

        let err = store.bind(&cid, Some(&carol), None).await.unwrap_err();
        assert!(matches!(err, ChannelError::BadRequest(_)));

        let err = store.bind(&cid, Some(&alice), None).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotFound));
    }

    #[tokio::test]
    async fn get_count_eviction_after_max_gets() {
        let store = ChannelStore::new(MemoryCache::new(), 4, 300, 3);
        let alice = cid256("a");
        let cid = store.create(&alice).await.unwrap();
        let record = store.bind(&cid, Some(&alice), None).await.unwrap();
        store.put(&cid, record, b"hi").await.unwrap();

        for _ in 0..3 {
            let record = store.bind(&cid, Some(&alice), None).await.unwrap();
            store.get(&cid, record, None).await.unwrap();
        }

        let err = store.bind(&cid, Some(&alice), None).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotFound));
    }

    #[tokio::test]
    async fn malformed_cid_shape_is_not_found() {
        let store = store();
        let alice = cid256("a");
        let err = store.bind("not/a-cid!", Some(&alice), None).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotFound));
    }

    #[tokio::test]
    async fn delete_is_idempotent_on_absent_channel() {
        let store = store();
        store.delete("nope").await.unwrap();
        store.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_client_id_length_is_rejected() {
        let store = store();
        let alice = cid256("a");
        let cid = store.create(&alice).await.unwrap();
        let short_id = "x".repeat(255);
        let err = store.bind(&cid, Some(&short_id), None).await.unwrap_err();
        assert!(matches!(err, ChannelError::BadRequest(_)));
    }

    #[tokio::test]
    async fn report_deletes_channel_when_caller_is_a_member() {
        let store = store();
        let alice = cid256("a");
        let cid = store.create(&alice).await.unwrap();

        store
            .report(Some(&alice), Some(&cid), "bye", b"log body", None)
            .await
            .unwrap();

        let err = store.bind(&cid, Some(&alice), None).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotFound));
    }

    #[tokio::test]
    async fn health_check_passes_against_memory_cache() {
        let store = store();
        store.health_check().await.unwrap();
    }

    #[test]
    fn etag_changes_with_body_length() {
        let a = compute_etag(3);
        let b = compute_etag(4);
        assert_ne!(a, b);
    }

    #[test]
    fn etag_set_parses_quoted_and_wildcard() {
        assert!(etag_set_contains("\"abc\", \"def\"", "def"));
        assert!(etag_set_contains("*", "anything"));
        assert!(!etag_set_contains("\"abc\"", "def"));
    }
}
