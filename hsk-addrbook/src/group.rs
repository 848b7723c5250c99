//! `group_key` (spec §4.5): compresses an address to a short byte
//! sequence used as the "network group" input to the bucket hashes, so
//! that eviction fairness is decided per-/16 (or equivalent) rather than
//! per individual host. Identical in shape to Bitcoin Core's
//! `CNetAddr::GetGroup`.

use hsk_core::NetAddress;
use std::net::{IpAddr, Ipv6Addr};

const GROUP_UNROUTABLE: u8 = 0;
const GROUP_ONION: u8 = 1;
const GROUP_IPV4: u8 = 4;
const GROUP_TEREDO: u8 = 6;
const GROUP_IPV6: u8 = 7;

pub fn group_key(addr: &NetAddress) -> Vec<u8> {
    if !addr.is_routable() {
        return vec![GROUP_UNROUTABLE];
    }
    if addr.is_onion() {
        // The onion pubkey hash lives past the fd87:d87e:eb43::/48 prefix;
        // group by its top 4 bits only (spec: "onion: /4").
        return vec![GROUP_ONION, addr.raw_ip[6] & 0xf0];
    }
    match addr.ip() {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            vec![GROUP_IPV4, o[0], o[1]]
        }
        IpAddr::V6(v6) => {
            if let Some(client) = teredo_client_ip(&v6) {
                vec![GROUP_TEREDO, client[0], client[1]]
            } else if is_he_net(&v6) {
                let o = v6.octets();
                // he.net tunnelbroker prefixes are handed out in /36s.
                vec![GROUP_IPV6, o[0], o[1], o[2], o[3], o[4] & 0xf0]
            } else {
                let o = v6.octets();
                vec![GROUP_IPV6, o[0], o[1], o[2], o[3]]
            }
        }
    }
}

fn is_teredo(v6: &Ipv6Addr) -> bool {
    let s = v6.segments();
    s[0] == 0x2001 && s[1] == 0x0000
}

/// Teredo addresses obfuscate the embedded client IPv4 by bitwise-NOT;
/// this recovers it so that teredo peers group by their real endpoint
/// rather than by the shared teredo prefix.
fn teredo_client_ip(v6: &Ipv6Addr) -> Option<[u8; 4]> {
    if !is_teredo(v6) {
        return None;
    }
    let o = v6.octets();
    Some([!o[12], !o[13], !o[14], !o[15]])
}

fn is_he_net(v6: &Ipv6Addr) -> bool {
    let s = v6.segments();
    s[0] == 0x2001 && s[1] == 0x0470
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn ipv4_groups_by_slash16() {
        let a = NetAddress::new(IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)), 1);
        let b = NetAddress::new(IpAddr::V4(Ipv4Addr::new(8, 8, 9, 9)), 1);
        let c = NetAddress::new(IpAddr::V4(Ipv4Addr::new(9, 8, 4, 4)), 1);
        assert_eq!(group_key(&a), group_key(&b));
        assert_ne!(group_key(&a), group_key(&c));
    }

    #[test]
    fn unroutable_collapses_to_single_group() {
        let a = NetAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 1);
        let b = NetAddress::new(IpAddr::V4(Ipv4Addr::new(10, 5, 5, 5)), 1);
        assert_eq!(group_key(&a), vec![GROUP_UNROUTABLE]);
        assert_eq!(group_key(&a), group_key(&b));
    }
}
