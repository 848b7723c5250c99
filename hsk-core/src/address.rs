use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

bitflags::bitflags! {
    /// Services advertised by a peer in its `version` packet.
    #[derive(Default)]
    pub struct Services: u32 {
        const NONE    = 0x0000_0000;
        const NETWORK = 0x0000_0001;
        const BLOOM   = 0x0000_0002;
        const VALUE   = 0x0000_0004;
    }
}

/// An address of a peer, as carried on the wire and in the AddrBook.
///
/// `identity_key == [0; 33]` means the peer does not support the
/// encrypted (brontide) transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetAddress {
    pub raw_ip: [u8; 16],
    pub port: u16,
    pub services: Services,
    pub time: u32,
    pub identity_key: [u8; 33],
}

impl NetAddress {
    pub fn new(ip: IpAddr, port: u16) -> NetAddress {
        NetAddress {
            raw_ip: ip_to_mapped_bytes(ip),
            port,
            services: Services::NONE,
            time: 0,
            identity_key: [0u8; 33],
        }
    }

    pub fn ip(&self) -> IpAddr {
        mapped_bytes_to_ip(&self.raw_ip)
    }

    pub fn has_key(&self) -> bool {
        self.identity_key != [0u8; 33]
    }

    pub fn is_onion(&self) -> bool {
        // Tor onion addresses are mapped into the reserved OR prefix
        // fd87:d87e:eb43::/48, matching the Bitcoin/Handshake convention.
        self.raw_ip[0..6] == [0xfd, 0x87, 0xd8, 0x7e, 0xeb, 0x43]
    }

    pub fn is_routable(&self) -> bool {
        if self.is_onion() {
            return true;
        }
        match self.ip() {
            IpAddr::V4(v4) => {
                !v4.is_private()
                    && !v4.is_loopback()
                    && !v4.is_link_local()
                    && !v4.is_broadcast()
                    && !v4.is_unspecified()
            }
            IpAddr::V6(v6) => !v6.is_loopback() && !v6.is_unspecified(),
        }
    }

    pub fn canonical_host(&self) -> String {
        if self.has_key() {
            format!("{}@{}:{}", base32_encode(&self.identity_key), self.ip(), self.port)
        } else {
            format!("{}:{}", self.ip(), self.port)
        }
    }
}

impl fmt::Debug for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetAddress({})", self.canonical_host())
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_host())
    }
}

fn ip_to_mapped_bytes(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

fn mapped_bytes_to_ip(raw: &[u8; 16]) -> IpAddr {
    let v6 = Ipv6Addr::from(*raw);
    if let Some(v4) = v6.to_ipv4_mapped() {
        IpAddr::V4(v4)
    } else {
        IpAddr::V6(v6)
    }
}

/// Minimal base32 (RFC4648, no padding, lowercase) encoder, used only for
/// the `key@host` canonical hostname form.
pub fn base32_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::new();
    let mut buf = 0u32;
    let mut bits = 0u32;
    for &byte in data {
        buf = (buf << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buf >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buf << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Inverse of [`base32_encode`]; used to recover `identity_key` from a
/// persisted `key@host` hostname.
pub fn base32_decode(s: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut buf = 0u32;
    let mut bits = 0u32;
    let mut out = Vec::new();
    for c in s.chars() {
        let v = ALPHABET.iter().position(|&a| a == c.to_ascii_lowercase() as u8)? as u32;
        buf = (buf << 5) | v;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buf >> bits) & 0xff) as u8);
        }
    }
    Some(out)
}

/// Parses the `ip:port` or `base32(key)@ip:port` canonical hostname form
/// produced by [`NetAddress::canonical_host`]. Used by the AddrBook to
/// reconstruct addresses from its persisted JSON file (spec §4.5/§6).
pub fn parse_canonical_host(s: &str) -> Option<NetAddress> {
    let (key_part, host_part) = match s.rfind('@') {
        Some(idx) => (Some(&s[..idx]), &s[idx + 1..]),
        None => (None, s),
    };
    let (host, port_str) = host_part.rsplit_once(':')?;
    let port: u16 = port_str.parse().ok()?;
    let ip: IpAddr = host.parse().ok()?;
    let mut addr = NetAddress::new(ip, port);
    if let Some(key_part) = key_part {
        let key_bytes = base32_decode(key_part)?;
        if key_bytes.len() != 33 {
            return None;
        }
        addr.identity_key.copy_from_slice(&key_bytes);
    }
    Some(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn routable_v4() {
        let a = NetAddress::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 13038);
        assert!(a.is_routable());
        let b = NetAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 13038);
        assert!(!b.is_routable());
    }

    #[test]
    fn canonical_host_without_key() {
        let a = NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 13038);
        assert_eq!(a.canonical_host(), "1.2.3.4:13038");
    }

    #[test]
    fn canonical_host_round_trips_without_key() {
        let a = NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 13038);
        let parsed = parse_canonical_host(&a.canonical_host()).unwrap();
        assert_eq!(parsed.ip(), a.ip());
        assert_eq!(parsed.port, a.port);
    }

    #[test]
    fn canonical_host_round_trips_with_key() {
        let mut a = NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 13038);
        a.identity_key = [7u8; 33];
        let parsed = parse_canonical_host(&a.canonical_host()).unwrap();
        assert_eq!(parsed.identity_key, a.identity_key);
        assert_eq!(parsed.port, a.port);
    }
}
