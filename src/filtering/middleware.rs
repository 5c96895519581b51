use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use super::blacklist::Blacklist;
use super::counter::AddressCounter;
use super::whitelist::Whitelist;
use crate::error::AppError;
use crate::services::cache::CacheClient;
use crate::services::cef::{self, Signature};

/// Call-rate and bad-request abuse mitigation wrapping the whole app
/// (spec.md §3.3, §4.3), mirroring `keyexchange.filtering.middleware.IPFiltering`.
#[derive(Clone)]
pub struct Filtering<C: CacheClient> {
    pub enabled: bool,
    pub observe: bool,
    pub admin_page: Option<String>,
    pub treshold: i64,
    pub br_treshold: i64,
    pub blacklist_ttl: u64,
    pub br_blacklist_ttl: u64,
    pub whitelist: Whitelist,
    pub counter: AddressCounter<C>,
    pub br_counter: AddressCounter<C>,
    pub blacklist: Blacklist<C>,
}

impl<C: CacheClient> Filtering<C> {
    fn is_admin_path(&self, path: &str) -> bool {
        self.admin_page.as_deref().is_some_and(|p| p == path)
    }

    fn is_whitelisted(&self, addr: &str) -> bool {
        addr.parse().is_ok_and(|ip| self.whitelist.contains(ip))
    }

    async fn check_call_rate(&self, addr: &str) -> Result<(), AppError> {
        let count = self.counter.increment(addr).await?;
        if count >= self.treshold {
            self.blacklist.add(addr, self.blacklist_ttl).await?;
            cef::log_failure(
                &format!("IP {addr} blacklisted after {count} calls"),
                Signature::BlacklistedIp,
                addr.parse().ok(),
            );
        }
        Ok(())
    }

    async fn check_bad_requests(&self, addr: &str) -> Result<(), AppError> {
        let count = self.br_counter.increment(addr).await?;
        if count >= self.br_treshold {
            self.blacklist.add(addr, self.br_blacklist_ttl).await?;
            cef::log_failure(
                &format!("IP {addr} blacklisted after {count} bad requests"),
                Signature::BlacklistedIp,
                addr.parse().ok(),
            );
        }
        Ok(())
    }
}

/// Extracts the caller's address the way the original middleware does:
/// the first `X-Forwarded-For` entry, falling back to the socket peer.
///
/// The `X-Forwarded-For` token must parse as an IP address; a client-
/// supplied value that doesn't (e.g. an attempt to smuggle an arbitrary
/// string into the counter/blacklist keyspace) is discarded in favour of
/// the socket peer instead of being trusted verbatim.
fn extract_address(req: &Request<Body>) -> Option<String> {
    if let Some(xff) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        let first = xff.split(',').next().unwrap_or("").trim();
        if let Ok(ip) = first.parse::<std::net::IpAddr>() {
            return Some(ip.to_string());
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// `tower::Layer`-compatible guard installed over every route except the
/// administrative page, which bypasses filtering entirely (spec.md §4.3).
pub async fn enforce<C: CacheClient + Clone + Send + Sync + 'static>(
    State(filtering): State<Filtering<C>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !filtering.enabled || filtering.is_admin_path(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let Some(addr) = extract_address(&req) else {
        return Err(AppError::Forbidden);
    };

    if !filtering.is_whitelisted(&addr) {
        if !filtering.observe && filtering.blacklist.contains(&addr).await? {
            return Err(AppError::Forbidden);
        }
        filtering.check_call_rate(&addr).await?;
    }

    let response = next.run(req).await;

    if !filtering.is_whitelisted(&addr) && response.status() == StatusCode::BAD_REQUEST {
        filtering.check_bad_requests(&addr).await?;
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;

    fn filtering(observe: bool) -> Filtering<MemoryCache> {
        let cache = MemoryCache::new();
        Filtering {
            enabled: true,
            observe,
            admin_page: Some("/__filter_admin__".to_string()),
            treshold: 3,
            br_treshold: 2,
            blacklist_ttl: 300,
            br_blacklist_ttl: 86400,
            whitelist: Whitelist::parse("10.0.0.1"),
            counter: AddressCounter::new(cache.clone(), "counter", 360),
            br_counter: AddressCounter::new(cache.clone(), "brcounter", 360),
            blacklist: Blacklist::new(cache),
        }
    }

    #[tokio::test]
    async fn blacklists_after_treshold_calls() {
        let f = filtering(false);
        for _ in 0..3 {
            f.check_call_rate("1.2.3.4").await.unwrap();
        }
        assert!(f.blacklist.contains("1.2.3.4").await.unwrap());
    }

    #[tokio::test]
    async fn whitelisted_address_is_never_blacklisted() {
        let f = filtering(false);
        assert!(f.is_whitelisted("10.0.0.1"));
        for _ in 0..10 {
            if !f.is_whitelisted("10.0.0.1") {
                f.check_call_rate("10.0.0.1").await.unwrap();
            }
        }
        assert!(!f.blacklist.contains("10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn bad_request_treshold_blacklists_independently_of_call_rate() {
        let f = filtering(false);
        for _ in 0..2 {
            f.check_bad_requests("9.9.9.9").await.unwrap();
        }
        assert!(f.blacklist.contains("9.9.9.9").await.unwrap());
    }
}
