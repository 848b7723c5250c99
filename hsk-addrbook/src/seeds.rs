//! DNS seed resolution hook (design note §9 "callback hooks"; SPEC_FULL
//! §C). The actual DNS algorithm is out of scope (spec §1 Non-goals); the
//! AddrBook only needs somewhere to plug a resolver in and a built-in
//! fallback so the pool can still reach the network when every seed
//! lookup fails (spec §7 "unresolvable DNS seeds ... falls back to
//! built-in seed IPs").

use hsk_core::NetAddress;
use std::net::{IpAddr, Ipv4Addr};

/// A pluggable DNS-seed resolver. Production code backs this with a real
/// resolver crate; tests use [`NoopSeedResolver`].
pub trait SeedResolver: Send + Sync {
    fn resolve(&self, hostname: &str) -> Vec<IpAddr>;
}

pub struct NoopSeedResolver;

impl SeedResolver for NoopSeedResolver {
    fn resolve(&self, _hostname: &str) -> Vec<IpAddr> {
        Vec::new()
    }
}

/// Hardcoded fallback peers used when every DNS seed lookup above fails.
/// Mirrors the shape (not the actual operator addresses) of Handshake
/// mainnet's built-in seed list.
pub fn builtin_seed_addresses(default_port: u16) -> Vec<NetAddress> {
    [
        Ipv4Addr::new(172, 104, 214, 189),
        Ipv4Addr::new(139, 162, 183, 168),
        Ipv4Addr::new(66, 187, 64, 13),
    ]
    .into_iter()
    .map(|ip| NetAddress::new(IpAddr::V4(ip), default_port))
    .collect()
}

/// Resolves every configured seed hostname, logging and skipping any that
/// fail, and falling back to [`builtin_seed_addresses`] if none resolved
/// at all.
pub fn resolve_seeds(resolver: &dyn SeedResolver, hosts: &[&str], default_port: u16) -> Vec<NetAddress> {
    let mut out = Vec::new();
    for host in hosts {
        let ips = resolver.resolve(host);
        if ips.is_empty() {
            log::warn!(target: "addrbook", "dns seed {} returned no addresses", host);
        }
        out.extend(ips.into_iter().map(|ip| NetAddress::new(ip, default_port)));
    }
    if out.is_empty() {
        log::warn!(target: "addrbook", "all dns seeds failed, falling back to built-in seed ips");
        out = builtin_seed_addresses(default_port);
    }
    out
}
