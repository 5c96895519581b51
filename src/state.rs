use crate::channel::ChannelStore;
use crate::config::Config;
use crate::filtering::{AddressCounter, Blacklist, Filtering, Whitelist};
use crate::services::cache::{Cache, MemoryCache, RedisCache};

/// Shared, clone-cheap application context injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub channels: ChannelStore<Cache>,
    pub filtering: Filtering<Cache>,
    pub root_redirect: String,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let cache = match &config.keyexchange.cache_url {
            Some(url) => Cache::Redis(RedisCache::new(url).await?),
            None => Cache::Memory(MemoryCache::new()),
        };

        let channels = ChannelStore::new(
            cache.clone(),
            config.keyexchange.cid_len,
            config.keyexchange.ttl_seconds,
            config.keyexchange.max_gets,
        );

        let f = &config.filtering;
        let filtering = Filtering {
            enabled: f.enabled,
            observe: f.observe,
            admin_page: f.admin_page.clone(),
            treshold: f.treshold,
            br_treshold: f.br_treshold,
            blacklist_ttl: f.blacklist_ttl_seconds,
            br_blacklist_ttl: f.br_blacklist_ttl_seconds,
            whitelist: Whitelist::parse(&f.ip_whitelist),
            counter: AddressCounter::new(cache.clone(), "counter", f.ip_queue_ttl_seconds),
            br_counter: AddressCounter::new(cache.clone(), "brcounter", f.ip_queue_ttl_seconds),
            blacklist: Blacklist::new(cache),
        };

        Ok(Self {
            channels,
            filtering,
            root_redirect: config.keyexchange.root_redirect.clone(),
        })
    }
}
