use thiserror::Error;

/// Errors the channel engine surfaces to the router (spec.md §7).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("channel not found")]
    NotFound,
    #[error("not modified")]
    NotModified,
    #[error("cache backend unavailable")]
    Unavailable,
}

impl From<crate::services::cache::CacheError> for ChannelError {
    fn from(_: crate::services::cache::CacheError) -> Self {
        ChannelError::Unavailable
    }
}
