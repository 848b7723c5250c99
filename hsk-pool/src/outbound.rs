//! Outbound connection filling, loader election, and address-gossip
//! relay (spec §4.2/§4.6): the pool periodically tops up its outbound
//! slots from the address book, picks one synced peer as the sync
//! "loader", and relays small/recent `addr` announcements to a couple
//! of siphash-selected peers rather than flooding everyone.

use hsk_core::NetAddress;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;
use std::time::Instant;

use hsk_addrbook::AddrBook;

use crate::options::PoolOptions;
use crate::peer::{PeerId, PeerSlab};

/// Width of the candidate window `get_host` is drawn from before the
/// filters below give up (spec §4.6 "fall back to the 100-candidate
/// window if strict filters exhaust").
const CANDIDATE_WINDOW: usize = 100;
/// Candidates at this index or later skip the last-attempt recency check.
const RECENCY_CUTOFF: usize = 30;
/// Candidates at this index or later skip the default-port check.
const DEFAULT_PORT_CUTOFF: usize = 50;
const RECENT_ATTEMPT_SECS: u64 = 10 * 60;

/// One address drawn from the book, with the position it was drawn at
/// (the filter cascade below is positional, not just per-address).
struct Candidate {
    addr: NetAddress,
    index: usize,
}

fn base_filters_pass(addr: &NetAddress, host: &str, slab: &PeerSlab, book: &mut AddrBook, options: &PoolOptions, now: u64) -> bool {
    if slab.find_by_host(host).is_some() {
        return false;
    }
    if !addr.is_routable() {
        return false;
    }
    if book.is_banned(host, now) {
        return false;
    }
    if !addr.services.contains(options.required_services) {
        return false;
    }
    if addr.is_onion() && !options.enable_onion {
        return false;
    }
    if options.brontide_only && !addr.has_key() {
        return false;
    }
    true
}

/// Chooses up to `want` candidate hosts to dial, applying the filter
/// cascade of spec §4.6 "Outbound filling" over a window of up to
/// [`CANDIDATE_WINDOW`] draws from the address book: not already
/// connected, not a local address, not banned, required services, not
/// onion unless enabled, brontide-key required if `brontide_only`,
/// recency of the last attempt for the 30 closest candidates, and
/// default port for the 50 closest. If the strict pass can't fill
/// `want`, a second pass over the same window drops the recency/port
/// constraints.
pub fn pick_outbound_candidates(book: &mut AddrBook, slab: &PeerSlab, options: &PoolOptions, want: usize, now: u64) -> Vec<NetAddress> {
    if want == 0 {
        return Vec::new();
    }

    let mut window = Vec::with_capacity(CANDIDATE_WINDOW);
    let mut seen_hosts = std::collections::HashSet::new();
    for index in 0..CANDIDATE_WINDOW {
        let Some(addr) = book.get_host(now) else { break };
        if !seen_hosts.insert(addr.canonical_host()) {
            continue;
        }
        window.push(Candidate { addr, index });
    }

    let mut picked = Vec::new();
    for candidate in &window {
        if picked.len() >= want {
            break;
        }
        let host = candidate.addr.canonical_host();
        if !base_filters_pass(&candidate.addr, &host, slab, book, options, now) {
            continue;
        }
        if candidate.index < RECENCY_CUTOFF {
            let recent = book.get(&host).map(|e| now.saturating_sub(e.last_attempt) < RECENT_ATTEMPT_SECS).unwrap_or(false);
            if recent {
                continue;
            }
        }
        if candidate.index < DEFAULT_PORT_CUTOFF && candidate.addr.port != options.default_port {
            continue;
        }
        picked.push(candidate.addr);
    }

    if picked.len() < want {
        for candidate in &window {
            if picked.len() >= want {
                break;
            }
            if picked.iter().any(|a: &NetAddress| a.canonical_host() == candidate.addr.canonical_host()) {
                continue;
            }
            let host = candidate.addr.canonical_host();
            if base_filters_pass(&candidate.addr, &host, slab, book, options, now) {
                picked.push(candidate.addr);
            }
        }
    }

    picked
}

/// Re-runs loader election (spec §4.6): exactly one handshaked,
/// fully-synced-capable peer is the loader at a time. Promotes the
/// first eligible peer found if none currently holds the role, and
/// demotes a loader that disconnected.
pub fn elect_loader(slab: &mut PeerSlab) {
    if slab.loader().is_some() {
        return;
    }
    let candidate = slab.handshaked().map(|p| p.id).next();
    if let Some(id) = candidate {
        if let Some(peer) = slab.get_mut(id) {
            peer.is_loader = true;
        }
    }
}

pub fn demote_loader(slab: &mut PeerSlab, id: PeerId) {
    if let Some(peer) = slab.get_mut(id) {
        peer.is_loader = false;
    }
}

/// Picks the 1-2 relay targets for one `addr` entry using a SipHash of
/// `(announce time bucket, address)` so the same address reliably picks
/// the same peers within a short window, spreading gossip without a
/// full-mesh flood (adapted from the teacher's per-peer trickle relay).
pub fn pick_gossip_relays(slab: &PeerSlab, addr: &NetAddress, day_bucket: u64, count: usize) -> Vec<PeerId> {
    let mut scored: Vec<(u64, PeerId)> = slab
        .iter()
        .map(|p| {
            let mut hasher = SipHasher13::new_with_keys(0x6164_6472_6b65_7931, day_bucket);
            hasher.write(addr.canonical_host().as_bytes());
            hasher.write(&p.id.to_le_bytes());
            (hasher.finish(), p.id)
        })
        .collect();
    scored.sort_by_key(|(score, _)| *score);
    scored.into_iter().take(count).map(|(_, id)| id).collect()
}

pub fn day_bucket(now: Instant, epoch: Instant) -> u64 {
    now.duration_since(epoch).as_secs() / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gossip_relay_selection_is_deterministic_for_same_bucket() {
        let slab = PeerSlab::new();
        let addr = NetAddress::new(std::net::IpAddr::from([1, 2, 3, 4]), 13038);
        let a = pick_gossip_relays(&slab, &addr, 10, 2);
        let b = pick_gossip_relays(&slab, &addr, 10, 2);
        assert_eq!(a, b);
    }
}
