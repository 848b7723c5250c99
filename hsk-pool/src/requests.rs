//! Global request-routing tables (spec §4.3 "one in-flight request per
//! object"): the pool tracks, per `(kind, hash)`, at most one outstanding
//! `getdata` so that two peers racing the same advertisement don't both
//! get asked for it. Keyed on the object identity rather than the peer,
//! so a disconnect just needs to re-walk the owning peer's slice.

use hsk_core::{Hash, InvType};
use std::collections::HashMap;
use std::time::Instant;

use crate::peer::PeerId;

#[derive(Debug, Clone, Copy)]
pub struct InFlight {
    pub peer: PeerId,
    pub requested_at: Instant,
}

/// One map per object kind, each independent so a stalled block request
/// never blocks tx/claim/airdrop routing (spec §4.3, §4.7 per-hash lock).
#[derive(Default)]
pub struct RequestMap {
    block: HashMap<Hash, InFlight>,
    tx: HashMap<Hash, InFlight>,
    claim: HashMap<Hash, InFlight>,
    airdrop: HashMap<Hash, InFlight>,
    name_proof: HashMap<Hash, InFlight>,
}

impl RequestMap {
    pub fn new() -> RequestMap {
        RequestMap::default()
    }

    fn table(&self, kind: InvType) -> &HashMap<Hash, InFlight> {
        match kind {
            InvType::Block | InvType::FilteredBlock | InvType::CompactBlock => &self.block,
            InvType::Tx => &self.tx,
            InvType::Claim => &self.claim,
            InvType::Airdrop => &self.airdrop,
        }
    }

    fn table_mut(&mut self, kind: InvType) -> &mut HashMap<Hash, InFlight> {
        match kind {
            InvType::Block | InvType::FilteredBlock | InvType::CompactBlock => &mut self.block,
            InvType::Tx => &mut self.tx,
            InvType::Claim => &mut self.claim,
            InvType::Airdrop => &mut self.airdrop,
        }
    }

    /// True if nobody currently holds the request for `hash`.
    pub fn is_free(&self, kind: InvType, hash: &Hash) -> bool {
        !self.table(kind).contains_key(hash)
    }

    /// Claims the request for `peer`. Caller must have already checked
    /// `is_free`; returns `false` (no-op) if someone beat us to it.
    pub fn claim(&mut self, kind: InvType, hash: Hash, peer: PeerId, now: Instant) -> bool {
        let table = self.table_mut(kind);
        if table.contains_key(&hash) {
            return false;
        }
        table.insert(hash, InFlight { peer, requested_at: now });
        true
    }

    pub fn resolve(&mut self, kind: InvType, hash: &Hash) -> Option<InFlight> {
        self.table_mut(kind).remove(hash)
    }

    pub fn owner(&self, kind: InvType, hash: &Hash) -> Option<PeerId> {
        self.table(kind).get(hash).map(|f| f.peer)
    }

    /// How many `kind` requests are currently claimed by `peer` (spec
    /// §4.6 "cap per-peer pending via MAX_TX/CLAIM_REQUEST").
    pub fn count_for_peer(&self, kind: InvType, peer: PeerId) -> usize {
        self.table(kind).values().filter(|f| f.peer == peer).count()
    }

    /// Releases every request owned by `peer` (on disconnect), returning
    /// the freed `(kind, hash)` pairs so the caller can re-request them
    /// from someone else.
    pub fn release_peer(&mut self, peer: PeerId) -> Vec<(InvType, Hash)> {
        let mut freed = Vec::new();
        for (kind, table) in [
            (InvType::Block, &mut self.block),
            (InvType::Tx, &mut self.tx),
            (InvType::Claim, &mut self.claim),
            (InvType::Airdrop, &mut self.airdrop),
        ] {
            table.retain(|hash, flight| {
                if flight.peer == peer {
                    freed.push((kind, *hash));
                    false
                } else {
                    true
                }
            });
        }
        freed
    }

    /// Requests stalled past `timeout`, so the caller can reassign them.
    pub fn stalled(&self, now: Instant, timeout: std::time::Duration) -> Vec<(InvType, Hash, PeerId)> {
        let mut out = Vec::new();
        for (kind, table) in [
            (InvType::Block, &self.block),
            (InvType::Tx, &self.tx),
            (InvType::Claim, &self.claim),
            (InvType::Airdrop, &self.airdrop),
        ] {
            for (hash, flight) in table {
                if now.duration_since(flight.requested_at) > timeout {
                    out.push((kind, *hash, flight.peer));
                }
            }
        }
        out
    }

    pub fn claim_name_proof(&mut self, name_hash: Hash, peer: PeerId, now: Instant) -> bool {
        if self.name_proof.contains_key(&name_hash) {
            return false;
        }
        self.name_proof.insert(name_hash, InFlight { peer, requested_at: now });
        true
    }

    pub fn resolve_name_proof(&mut self, name_hash: &Hash) -> Option<InFlight> {
        self.name_proof.remove(name_hash)
    }
}

/// Per-kind, process-wide dedup of objects already seen this session
/// (spec §4.3 "suppress re-announcement"): a rolling set bounded by the
/// caller-supplied max, so memory stays flat under sustained traffic.
pub struct SeenSet {
    order: std::collections::VecDeque<Hash>,
    set: std::collections::HashSet<Hash>,
    max: usize,
}

impl SeenSet {
    pub fn new(max: usize) -> SeenSet {
        SeenSet { order: std::collections::VecDeque::new(), set: std::collections::HashSet::new(), max }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.set.contains(hash)
    }

    /// Records `hash` as seen, returning `true` if it was newly inserted.
    pub fn insert(&mut self, hash: Hash) -> bool {
        if !self.set.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        if self.order.len() > self.max {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }

    /// Forgets `hash`, so a future `inv` for it is treated as unseen. Used
    /// when the peer that owned its in-flight request disconnects before
    /// delivering it, so another peer's advertisement isn't dropped as a
    /// duplicate of a request that will never complete.
    pub fn forget(&mut self, hash: &Hash) {
        self.set.remove(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_on_same_hash_fails() {
        let mut map = RequestMap::new();
        let hash = Hash::default();
        let now = Instant::now();
        assert!(map.claim(InvType::Block, hash, 1, now));
        assert!(!map.claim(InvType::Block, hash, 2, now));
        assert_eq!(map.owner(InvType::Block, &hash), Some(1));
    }

    #[test]
    fn release_peer_frees_only_its_own_requests() {
        let mut map = RequestMap::new();
        let now = Instant::now();
        let h1 = Hash([1u8; 32]);
        let h2 = Hash([2u8; 32]);
        map.claim(InvType::Tx, h1, 1, now);
        map.claim(InvType::Tx, h2, 2, now);
        let freed = map.release_peer(1);
        assert_eq!(freed, vec![(InvType::Tx, h1)]);
        assert!(!map.is_free(InvType::Tx, &h2));
    }

    #[test]
    fn seen_set_evicts_oldest_past_capacity() {
        let mut seen = SeenSet::new(2);
        let h1 = Hash([1u8; 32]);
        let h2 = Hash([2u8; 32]);
        let h3 = Hash([3u8; 32]);
        assert!(seen.insert(h1));
        assert!(seen.insert(h2));
        assert!(seen.insert(h3));
        assert!(!seen.contains(&h1));
        assert!(seen.contains(&h2));
        assert!(seen.contains(&h3));
    }
}
