//! Logging sink used by the channel engine and filter.
//!
//! Stands in for the original `services.cef.log_failure(message, severity,
//! request_environ, config, signature=...)` collaborator named in spec.md
//! §1/§6.4. The numeric severity scale from the original CEF-style logger
//! doesn't map to anything in `tracing`; every signature the core emits is a
//! `warn` (the original only ever called it with severity 5), so we drop the
//! parameter and keep the signature, which is what downstream log processors
//! actually key off of.
use std::net::IpAddr;

/// One of the signatures the core is allowed to emit (spec.md §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    InvalidClientId,
    UnknownClientId,
    InvalidChannelId,
    DeleteLog,
    Report,
    BlacklistedIp,
}

impl Signature {
    fn as_str(self) -> &'static str {
        match self {
            Signature::InvalidClientId => "InvalidClientId",
            Signature::UnknownClientId => "UnknownClientId",
            Signature::InvalidChannelId => "InvalidChannelId",
            Signature::DeleteLog => "DeleteLog",
            Signature::Report => "Report",
            Signature::BlacklistedIp => "BlacklistedIP",
        }
    }
}

/// Emits one structured log line carrying `signature` plus whatever request
/// context is available. `source` is the caller's address, if known.
pub fn log_failure(message: &str, signature: Signature, source: Option<IpAddr>) {
    tracing::warn!(
        signature = signature.as_str(),
        source = %source.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string()),
        "{message}"
    );
}
