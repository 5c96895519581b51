use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

/// Addresses exempt from counting and blacklist enforcement (spec.md §3.3,
/// configured via `FILTERING_IP_WHITELIST`). Entries are CIDR ranges or bare
/// addresses, comma-separated.
#[derive(Clone, Debug, Default)]
pub struct Whitelist {
    nets: Vec<IpNet>,
}

impl Whitelist {
    pub fn parse(raw: &str) -> Self {
        let nets = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|entry| {
                IpNet::from_str(entry)
                    .or_else(|_| IpAddr::from_str(entry).map(IpNet::from))
                    .inspect_err(|_| {
                        tracing::warn!(entry, "ignoring unparsable whitelist entry");
                    })
                    .ok()
            })
            .collect();
        Self { nets }
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(&addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_bare_address() {
        let wl = Whitelist::parse("10.0.0.5");
        assert!(wl.contains("10.0.0.5".parse().unwrap()));
        assert!(!wl.contains("10.0.0.6".parse().unwrap()));
    }

    #[test]
    fn matches_cidr_range() {
        let wl = Whitelist::parse("10.0.0.0/24, 192.168.1.1");
        assert!(wl.contains("10.0.0.200".parse().unwrap()));
        assert!(wl.contains("192.168.1.1".parse().unwrap()));
        assert!(!wl.contains("10.0.1.1".parse().unwrap()));
    }

    #[test]
    fn empty_whitelist_matches_nothing() {
        let wl = Whitelist::parse("");
        assert!(!wl.contains("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn skips_unparsable_entries_without_failing() {
        let wl = Whitelist::parse("not-an-ip, 10.0.0.1");
        assert!(wl.contains("10.0.0.1".parse().unwrap()));
    }
}
