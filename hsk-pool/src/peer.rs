//! Pool-owned peer bookkeeping (design note §9 "cyclic references"):
//! peers are identified by a plain `u64` id and held in a central slab
//! owned by `Pool`. A peer never holds a direct reference back to the
//! pool or to other peers — only its id and an outbound sender, so there
//! is no `Rc`/weak-reference cycle to manage.

use hsk_core::{Hash, InvItem, NetAddress, Services};
use hsk_net::{Payload, PeerSession};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

use crate::compact::Reassembler;

pub type PeerId = u64;

/// Compact-block negotiation mode (spec §3 "Peer state"): not yet
/// negotiated, low-bandwidth (always full block on miss), or
/// high-bandwidth (peer may push unsolicited compact blocks once synced).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactMode {
    Unset,
    LowBandwidth,
    HighBandwidth,
}

/// Everything the pool tracks about one connection. Outbound writes go
/// through `sender`, which is the only channel back to the actual
/// socket task; nothing here borrows the socket or the pool.
pub struct PeerHandle {
    pub id: PeerId,
    pub addr: NetAddress,
    pub outbound: bool,
    pub is_loader: bool,
    pub session: PeerSession,
    pub sender: UnboundedSender<Payload>,
    pub compact_mode: CompactMode,
    pub best_hash: Hash,
    pub best_height: u32,
    pub compact_blocks: HashMap<Hash, Reassembler>,
    pub compact_deadlines: HashMap<Hash, Instant>,
    pub proofs_served: u64,
    pub pending_proof: HashSet<Hash>,
    pub spv_filter: Option<Vec<u8>>,
    pub relay: bool,
}

impl PeerHandle {
    pub fn send(&self, payload: Payload) {
        let _ = self.sender.send(payload);
    }

    pub fn hostname(&self) -> String {
        self.addr.canonical_host()
    }

    pub fn queue_inv(&mut self, item: InvItem) {
        if self.session.queue_inv(item) {
            if let Some(msg) = self.session.flush_inv(Instant::now(), true) {
                self.send(msg);
            }
        }
    }

    pub fn services(&self) -> Services {
        self.addr.services
    }
}

/// The central peer registry (design note §9). `Pool` is the sole owner;
/// everything else addresses a peer by id.
#[derive(Default)]
pub struct PeerSlab {
    next_id: PeerId,
    peers: HashMap<PeerId, PeerHandle>,
}

impl PeerSlab {
    pub fn new() -> PeerSlab {
        PeerSlab { next_id: 1, peers: HashMap::new() }
    }

    pub fn insert(&mut self, build: impl FnOnce(PeerId) -> PeerHandle) -> PeerId {
        let id = self.next_id;
        self.next_id += 1;
        self.peers.insert(id, build(id));
        id
    }

    pub fn remove(&mut self, id: PeerId) -> Option<PeerHandle> {
        self.peers.remove(&id)
    }

    pub fn get(&self, id: PeerId) -> Option<&PeerHandle> {
        self.peers.get(&id)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut PeerHandle> {
        self.peers.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerHandle> {
        self.peers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerHandle> {
        self.peers.values_mut()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn outbound_count(&self) -> usize {
        self.peers.values().filter(|p| p.outbound).count()
    }

    pub fn inbound_count(&self) -> usize {
        self.peers.values().filter(|p| !p.outbound).count()
    }

    pub fn loader(&self) -> Option<PeerId> {
        self.peers.values().find(|p| p.is_loader).map(|p| p.id)
    }

    pub fn find_by_host(&self, host: &str) -> Option<PeerId> {
        self.peers.values().find(|p| p.hostname() == host).map(|p| p.id)
    }

    pub fn handshaked(&self) -> impl Iterator<Item = &PeerHandle> {
        self.peers.values().filter(|p| p.session.is_handshake_done())
    }
}
