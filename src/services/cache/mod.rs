pub mod client;
pub mod dyn_cache;
pub mod memory;
pub mod prefixed;
pub mod redis_backend;

pub use client::{CacheClient, CacheError, CacheResult, CasOutcome, ttl_seconds};
pub use dyn_cache::Cache;
pub use memory::MemoryCache;
pub use prefixed::PrefixedCache;
pub use redis_backend::RedisCache;
