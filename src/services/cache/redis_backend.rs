use async_trait::async_trait;
use std::time::Duration;

use super::client::{CacheClient, CacheError, CacheResult, CasOutcome};

/// Redis/Valkey-backed cache client.
///
/// `gets`/`cas` are implemented with the stored value itself acting as the
/// compare token (a classic "optimistic set" pattern): `cas` only succeeds if
/// the value has not changed since the paired `gets`. This is sufficient for
/// the blacklist's membership-set reconciliation, which never needs more than
/// "nobody else wrote in between".
#[derive(Clone, Debug)]
pub struct RedisCache {
    manager: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Create a client from a URL like `redis://localhost:6379`.
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

fn cmd_err(e: redis::RedisError) -> CacheError {
    CacheError::BackendCommand(e.to_string())
}

const CAS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    local ttl = tonumber(ARGV[3])
    if ttl > 0 then
        redis.call('EXPIRE', KEYS[1], ttl)
    end
    return 1
else
    return 0
end
"#;

#[async_trait]
impl CacheClient for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        let resp: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cmd_err)?;
        Ok(resp)
    }

    async fn add(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        let secs = ttl.as_secs();
        if secs > 0 {
            cmd.arg("EX").arg(secs);
        }
        let resp: Option<String> = cmd.query_async(&mut conn).await.map_err(cmd_err)?;
        Ok(resp.is_some())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        let secs = ttl.as_secs();
        if secs > 0 {
            cmd.arg("EX").arg(secs);
        }
        let resp: redis::Value = cmd.query_async(&mut conn).await.map_err(cmd_err)?;
        Ok(!matches!(resp, redis::Value::Nil))
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let n: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cmd_err)?;
        // absence is also success
        let _ = n;
        Ok(true)
    }

    async fn incr(&self, key: &str) -> CacheResult<Option<i64>> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cmd_err)?;
        if !exists {
            return Ok(None);
        }
        let v: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cmd_err)?;
        Ok(Some(v))
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
        let mut conn = self.manager.clone();
        let result: i64 = redis::Script::new(CAS_SCRIPT)
            .key(key)
            .arg(token)
            .arg(value)
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(cmd_err)?;

        if result == 1 {
            Ok(CasOutcome::Swapped)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }
}
