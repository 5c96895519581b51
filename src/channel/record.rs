use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The state tuple stored under `keyexchange:{cid}` (spec.md §3.1).
///
/// `body` is opaque bytes at the protocol boundary; since the cache
/// interface is string-based we carry it base64-encoded here and decode at
/// the HTTP edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Absolute expiry, seconds since epoch.
    pub ttl: u64,
    /// The first client that created the channel, then the second that joined.
    pub ids: Vec<String>,
    pub body_b64: String,
    pub etag: Option<String>,
}

impl ChannelRecord {
    pub fn new(creator_id: &str, ttl: u64) -> Self {
        use base64::Engine as _;
        Self {
            ttl,
            ids: vec![creator_id.to_string()],
            body_b64: base64::engine::general_purpose::STANDARD.encode(b"{}"),
            etag: None,
        }
    }

    pub fn remaining_ttl_secs(&self) -> u64 {
        self.ttl.saturating_sub(now_epoch())
    }

    pub fn is_expired(&self) -> bool {
        self.ttl <= now_epoch()
    }
}

pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
