use anyhow::Result;
use std::net::SocketAddr;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Channel-engine options (spec.md §6.2).
pub struct KeyExchangeConfig {
    pub cid_len: usize,
    pub ttl_seconds: u64,
    pub max_gets: i64,
    pub root_redirect: String,
    pub cache_url: Option<String>,
}

/// Filter options (spec.md §4.3, §6.2).
pub struct FilteringConfig {
    pub enabled: bool,
    pub blacklist_ttl_seconds: u64,
    pub br_blacklist_ttl_seconds: u64,
    pub treshold: i64,
    pub br_treshold: i64,
    pub ip_queue_ttl_seconds: u64,
    pub observe: bool,
    pub admin_page: Option<String>,
    pub ip_whitelist: String,
}

pub struct Config {
    pub addr: SocketAddr,
    pub keyexchange: KeyExchangeConfig,
    pub filtering: FilteringConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port: u16 = env_or("PORT", 8080);
        let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;

        if std::env::var("QUEUE_SIZE").is_ok() || std::env::var("BR_QUEUE_SIZE").is_ok() {
            tracing::info!("queue_size/br_queue_size are legacy aliases and are ignored");
        }

        let keyexchange = KeyExchangeConfig {
            cid_len: env_or("KEYEXCHANGE_CID_LEN", 4),
            ttl_seconds: env_or("KEYEXCHANGE_TTL_SECONDS", 300),
            max_gets: env_or("KEYEXCHANGE_MAX_GETS", 6),
            root_redirect: std::env::var("KEYEXCHANGE_ROOT_REDIRECT")
                .unwrap_or_else(|_| "https://example.com/".to_string()),
            cache_url: env_opt("KEYEXCHANGE_CACHE_URL"),
        };

        let filtering = FilteringConfig {
            enabled: env_or("FILTERING_ENABLED", false),
            blacklist_ttl_seconds: env_or("FILTERING_BLACKLIST_TTL_SECONDS", 300),
            br_blacklist_ttl_seconds: env_or("FILTERING_BR_BLACKLIST_TTL_SECONDS", 86400),
            treshold: env_or("FILTERING_TRESHOLD", 20),
            br_treshold: env_or("FILTERING_BR_TRESHOLD", 5),
            ip_queue_ttl_seconds: env_or("FILTERING_IP_QUEUE_TTL_SECONDS", 360),
            observe: env_or("FILTERING_OBSERVE", false),
            admin_page: env_opt("FILTERING_ADMIN_PAGE").map(|p| {
                if p.starts_with('/') { p } else { format!("/{p}") }
            }),
            ip_whitelist: std::env::var("FILTERING_IP_WHITELIST").unwrap_or_default(),
        };

        Ok(Self {
            addr,
            keyexchange,
            filtering,
        })
    }
}
