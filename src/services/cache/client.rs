//! Cache client interface used by every higher-level service (channel store,
//! blacklist, per-address counters).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// Outcome of a compare-and-swap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Swapped,
    /// The token was stale; caller should re-read with `gets` and retry.
    Conflict,
}

/// A minimal, string-based key-value cache interface.
///
/// This is intentionally narrow: the channel store, blacklist, and
/// per-address counters only need `get`/`add`/`set`/`delete`/`incr` plus the
/// `gets`/`cas` pair for the blacklist's membership-set reconciliation.
/// Implementations must be cheap to clone (typically an `Arc<...>` or a
/// connection-manager handle inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    /// Backend name, for logging.
    fn backend_name(&self) -> &'static str;

    /// Returns the stored value, or `None` if absent (or expired).
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Inserts only if `key` is absent. `ttl` of zero duration means no expiry.
    /// Returns whether the value was inserted.
    async fn add(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;

    /// Overwrites unconditionally. Returns whether the value was persisted.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;

    /// Removes `key` if present. Absence is also success.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Atomically increments an integer value. Returns the new value, or
    /// `None` if the key does not exist (caller must re-seed with `set`).
    async fn incr(&self, key: &str) -> CacheResult<Option<i64>>;

    /// Read-with-token, used by `cas`. Returns the value and an opaque token
    /// that must match on the following `cas` call.
    async fn gets(&self, key: &str) -> CacheResult<Option<(String, String)>>;

    /// Compare-and-swap: write `value` only if the stored token still
    /// matches `token`. Returns `Conflict` if another writer raced ahead.
    async fn cas(
        &self,
        key: &str,
        value: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<CasOutcome>;
}

/// Convenience helper to build a TTL from seconds. `0` means "no expiry".
pub fn ttl_seconds(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
