//! Local-address advertisement scoring (spec §4.5 "Local address
//! scoring"): when telling a peer about ourselves, which of our known
//! local addresses (behind NAT, from UPnP, manually configured, ...) do
//! we advertise? Mirrors Bitcoin Core's `GetLocal`/`IsReachable` pair.

use hsk_core::NetAddress;
use std::net::IpAddr;

/// `NONE < IF < BIND < DNS < UPNP < MANUAL` (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScoreSource {
    None,
    Interface,
    Bind,
    Dns,
    Upnp,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Reachability {
    Unreachable,
    Default,
    Teredo,
    Ipv6Weak,
    Ipv4,
    Ipv6Strong,
    Private,
}

#[derive(Debug, Clone)]
pub struct LocalAddress {
    pub addr: NetAddress,
    pub source: ScoreSource,
    pub score: u32,
}

/// Registry of locally-known addresses, scored for advertisement. Owned
/// by [`crate::AddrBook`]; populated from listen sockets, UPnP mappings,
/// and explicit `--external-ip` configuration.
#[derive(Default)]
pub struct LocalAddressSet {
    addrs: Vec<LocalAddress>,
}

impl LocalAddressSet {
    pub fn new() -> LocalAddressSet {
        LocalAddressSet::default()
    }

    pub fn add(&mut self, addr: NetAddress, source: ScoreSource, score: u32) {
        if let Some(existing) = self.addrs.iter_mut().find(|a| a.addr.ip() == addr.ip() && a.addr.port == addr.port) {
            if source >= existing.source {
                existing.source = source;
                existing.score = existing.score.max(score);
            }
            return;
        }
        self.addrs.push(LocalAddress { addr, source, score });
    }

    /// `source == None`: pick the highest-`score` non-brontide address.
    /// `source` given: maximize reachability from that peer's vantage
    /// point, tie-broken by `score`. `mainnet` conservatively drops
    /// anything scored below `Upnp` (spec: "On main network ignore <
    /// UPNP").
    pub fn get_local_address(&self, dest: Option<&NetAddress>, mainnet: bool) -> Option<NetAddress> {
        let candidates = self.addrs.iter().filter(|a| !mainnet || a.source >= ScoreSource::Upnp);

        match dest {
            None => candidates
                .filter(|a| !a.addr.has_key())
                .max_by_key(|a| a.score)
                .map(|a| a.addr),
            Some(dest) => candidates
                .max_by_key(|a| (reachability(dest, &a.addr), a.score))
                .map(|a| a.addr),
        }
    }
}

fn reachability(dest: &NetAddress, local: &NetAddress) -> Reachability {
    if !local.is_routable() {
        return Reachability::Private;
    }
    match (dest.ip(), local.ip()) {
        (IpAddr::V4(_), IpAddr::V4(_)) => Reachability::Ipv4,
        (IpAddr::V6(d), IpAddr::V6(l)) => {
            if is_teredo(&d) || is_teredo(&l) {
                Reachability::Teredo
            } else if is_routable_v6(&l) {
                Reachability::Ipv6Strong
            } else {
                Reachability::Ipv6Weak
            }
        }
        (IpAddr::V4(_), IpAddr::V6(l)) => {
            if is_routable_v6(&l) {
                Reachability::Ipv6Weak
            } else {
                Reachability::Default
            }
        }
        (IpAddr::V6(_), IpAddr::V4(_)) => Reachability::Default,
    }
}

fn is_teredo(v6: &std::net::Ipv6Addr) -> bool {
    let s = v6.segments();
    s[0] == 0x2001 && s[1] == 0x0000
}

fn is_routable_v6(v6: &std::net::Ipv6Addr) -> bool {
    !v6.is_loopback() && !v6.is_unspecified() && !is_teredo(v6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn highest_score_wins_without_destination() {
        let mut set = LocalAddressSet::new();
        set.add(NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 1), ScoreSource::Manual, 10);
        set.add(NetAddress::new(IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2)), 1), ScoreSource::Upnp, 5);
        let picked = set.get_local_address(None, false).unwrap();
        assert_eq!(picked.ip(), IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)));
    }

    #[test]
    fn mainnet_ignores_weak_sources() {
        let mut set = LocalAddressSet::new();
        set.add(NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 1), ScoreSource::Interface, 100);
        assert!(set.get_local_address(None, true).is_none());
    }
}
