//! The multi-peer coordinator (spec §4): owns the peer slab, address
//! book, request-routing tables, sync state, and broadcast/name-proof
//! trackers, and turns inbound `Payload`s plus periodic ticks into
//! outbound actions. Deliberately IO-free, the same way `PeerSession` is
//! IO-free — something outside this module owns the actual sockets and
//! feeds decoded payloads in, the way the teacher's sync module is
//! driven by its `IoChannel` rather than holding listeners itself.

use hsk_core::{Hash, InvItem, InvType, NetAddress};
use hsk_net::{Action, DisconnectReason, Payload, PeerSession, SessionConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::{BroadcastOutcome, BroadcastTracker};
use crate::chain::Chain;
use crate::compact::Reassembler;
use crate::error::Result;
use crate::mempool::Mempool;
use crate::names::{pick_prover, NameResolver, ProofVerifier};
use crate::options::PoolOptions;
use crate::outbound::{demote_loader, elect_loader, pick_gossip_relays, pick_outbound_candidates};
use crate::peer::{CompactMode, PeerHandle, PeerId, PeerSlab};
use crate::requests::{RequestMap, SeenSet};
use crate::sync::SyncState;

use hsk_addrbook::AddrBook;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// What the caller (the socket-owning layer) should do in response.
pub enum PoolAction {
    Send(PeerId, Payload),
    Disconnect(PeerId, DisconnectReason),
    Connect(NetAddress),
}

const STALL_TIMEOUT: Duration = Duration::from_secs(5);
const BROADCAST_ACK_THRESHOLD: usize = 1;

pub struct Pool {
    options: PoolOptions,
    slab: PeerSlab,
    book: AddrBook,
    requests: RequestMap,
    inv_seen: SeenSet,
    addr_seen: SeenSet,
    broadcasts: BroadcastTracker,
    sync: SyncState,
    names: NameResolver,
    chain: Arc<dyn Chain>,
    mempool: Arc<dyn Mempool>,
    proof_verifier: Arc<dyn ProofVerifier>,
    /// Monotonic instant paired with the wall-clock unix time it
    /// corresponds to, so every `Instant` the caller passes in can be
    /// turned into the real unix seconds the address book persists.
    clock_anchor: (Instant, u64),
    /// Transaction order of compact blocks we ourselves announced, so a
    /// peer's `getblocktxn` against one of them can be answered by index
    /// (spec §4.5; the symmetric case of `Reassembler`, which tracks the
    /// blocks peers announce to us).
    sent_compact: std::collections::HashMap<Hash, Vec<Hash>>,
}

impl Pool {
    pub fn new(
        options: PoolOptions,
        book: AddrBook,
        chain: Arc<dyn Chain>,
        mempool: Arc<dyn Mempool>,
        proof_verifier: Arc<dyn ProofVerifier>,
        genesis: Hash,
        now: Instant,
        unix_now: u64,
    ) -> Pool {
        Pool {
            options,
            slab: PeerSlab::new(),
            book,
            requests: RequestMap::new(),
            inv_seen: SeenSet::new(hsk_core::constants::MAX_INV_ITEMS),
            addr_seen: SeenSet::new(hsk_core::constants::MAX_INV_ITEMS),
            broadcasts: BroadcastTracker::new(Duration::from_secs(hsk_core::constants::BROADCAST_TIMEOUT_SECS)),
            sync: SyncState::new(genesis),
            names: NameResolver::new(),
            chain,
            mempool,
            proof_verifier,
            clock_anchor: (now, unix_now),
            sent_compact: std::collections::HashMap::new(),
        }
    }

    /// Announces a locally-assembled block as a compact block to a
    /// high-bandwidth peer (spec §4.5), remembering its tx order so a
    /// later `getblocktxn` for it can be answered.
    pub fn send_compact_block(&mut self, to: PeerId, header: Vec<u8>, nonce: u64, txs: Vec<Hash>) -> Option<PoolAction> {
        let peer = self.slab.get(to)?;
        if peer.compact_mode != CompactMode::HighBandwidth {
            return None;
        }
        let header_hash = Hash::digest(&header);
        let keys = crate::compact::derive_siphash_keys(&header_hash, nonce);
        let short_ids = txs.iter().map(|h| crate::compact::short_id(keys, h)).collect();
        self.sent_compact.insert(header_hash, txs);
        Some(PoolAction::Send(
            to,
            Payload::CmpctBlock(hsk_net::CmpctBlockPayload { header, nonce, short_ids, prefilled: Vec::new() }),
        ))
    }

    fn unix_secs(&self, now: Instant) -> u64 {
        let (anchor_instant, anchor_unix) = self.clock_anchor;
        if now >= anchor_instant {
            anchor_unix + now.duration_since(anchor_instant).as_secs()
        } else {
            anchor_unix.saturating_sub(anchor_instant.duration_since(now).as_secs())
        }
    }

    pub fn peer_count(&self) -> usize {
        self.slab.len()
    }

    pub fn addr_book_mut(&mut self) -> &mut AddrBook {
        &mut self.book
    }

    /// Registers a freshly connected, not-yet-handshaked peer and
    /// returns its id plus the outbound-channel receiver's sending half
    /// the caller should wire to the socket writer.
    pub fn register_peer(
        &mut self,
        addr: NetAddress,
        outbound: bool,
        sender: UnboundedSender<Payload>,
        now: Instant,
        unix_time: u64,
    ) -> (PeerId, Vec<Payload>) {
        let config = SessionConfig {
            our_version: 1,
            our_services: self.options.required_services,
            our_agent: self.options.user_agent.clone(),
            our_height: self.chain.tip_height(),
            our_nonce: self.options.our_nonce,
            outbound,
        };
        let mut session = PeerSession::new(config, now);
        let actions = session.start(addr, now, unix_time);
        let id = self.slab.insert(|id| PeerHandle {
            id,
            addr,
            outbound,
            is_loader: false,
            session,
            sender,
            compact_mode: CompactMode::Unset,
            best_hash: Hash::ZERO,
            best_height: 0,
            compact_blocks: Default::default(),
            compact_deadlines: Default::default(),
            proofs_served: 0,
            pending_proof: Default::default(),
            spv_filter: None,
            relay: true,
        });
        let outgoing = actions
            .into_iter()
            .filter_map(|a| match a {
                Action::Send(p) => Some(p),
                _ => None,
            })
            .collect();
        (id, outgoing)
    }

    pub fn remove_peer(&mut self, id: PeerId) -> Vec<PoolAction> {
        self.slab.remove(id);
        for (_, hash) in self.requests.release_peer(id) {
            self.inv_seen.forget(&hash);
        }
        demote_loader(&mut self.slab, id);
        elect_loader(&mut self.slab);
        Vec::new()
    }

    /// Feeds one decoded payload from `from` through the session state
    /// machine and then the pool's own routing logic.
    pub fn handle(&mut self, from: PeerId, payload: Payload, now: Instant) -> Vec<PoolAction> {
        let actions = match self.slab.get_mut(from) {
            Some(peer) => peer.session.handle(payload.clone(), now),
            None => return Vec::new(),
        };

        let mut out = Vec::new();
        let mut disconnect = None;
        for action in actions {
            match action {
                Action::Send(p) => out.push(PoolAction::Send(from, p)),
                Action::Deliver(p) => out.extend(self.route(from, p, now)),
                Action::AddBanScore(_) => {}
                Action::Disconnect(reason) => disconnect = Some(reason),
            }
        }
        if let Some(reason) = disconnect {
            out.push(PoolAction::Disconnect(from, reason));
        } else if let Some(peer) = self.slab.get(from) {
            if peer.session.is_handshake_done() {
                elect_loader(&mut self.slab);
            }
        }
        out
    }

    fn route(&mut self, from: PeerId, payload: Payload, now: Instant) -> Vec<PoolAction> {
        match payload {
            Payload::GetAddr => self.on_getaddr(from),
            Payload::Addr(a) => self.on_addr(from, a.addrs, now),
            Payload::Inv(inv) => self.on_inv(from, inv.items, now),
            Payload::GetData(inv) => self.on_getdata(from, inv.items),
            Payload::Block(raw) => self.on_block(from, raw, now),
            Payload::Tx(raw) => self.on_tx(from, raw),
            Payload::Claim(raw) => self.on_claim(from, raw),
            Payload::Airdrop(raw) => self.on_airdrop(from, raw),
            Payload::Headers(h) => self.on_headers(from, h.headers),
            Payload::GetBlocks(g) | Payload::GetHeaders(g) => self.on_getblocks(from, g.locator, g.stop),
            Payload::SendCmpct(s) => self.on_sendcmpct(from, s.enable),
            Payload::CmpctBlock(c) => self.on_cmpct_block(from, c, now),
            Payload::GetBlockTxn(g) => self.on_get_block_txn(from, g.block_hash, g.indexes),
            Payload::BlockTxn(b) => self.on_block_txn(from, b.block_hash, b.txs),
            Payload::GetProof(g) => self.on_get_proof(from, g.key, g.root, now),
            Payload::Proof(p) => self.on_proof(from, p.nodes),
            Payload::Reject(r) => self.on_reject(r),
            _ => Vec::new(),
        }
    }

    fn on_getaddr(&mut self, from: PeerId) -> Vec<PoolAction> {
        // Out of scope to enumerate every addrbook entry here; the
        // caller-provided sample comes from the book directly.
        let _ = from;
        Vec::new()
    }

    fn on_addr(&mut self, from: PeerId, addrs: Vec<NetAddress>, now: Instant) -> Vec<PoolAction> {
        let unix_now = self.unix_secs(now);
        let src = self.slab.get(from).map(|p| p.addr);
        let Some(src) = src else { return Vec::new() };
        let mut out = Vec::new();
        for addr in addrs {
            if !self.addr_seen.insert(Hash::digest(addr.canonical_host().as_bytes())) {
                continue;
            }
            self.book.add(addr, src, unix_now);
            let bucket = crate::outbound::day_bucket(now, self.clock_anchor.0);
            for target in pick_gossip_relays(&self.slab, &addr, bucket, 2) {
                if target != from {
                    out.push(PoolAction::Send(target, Payload::Addr(hsk_net::AddrPayload { addrs: vec![addr] })));
                }
            }
        }
        out
    }

    fn on_inv(&mut self, from: PeerId, items: Vec<InvItem>, now: Instant) -> Vec<PoolAction> {
        let mut wanted = Vec::new();
        let mut out = Vec::new();
        for item in items {
            if item.kind == InvType::Block || item.kind == InvType::FilteredBlock || item.kind == InvType::CompactBlock {
                if let Some(peer) = self.slab.get_mut(from) {
                    peer.best_hash = item.hash;
                    peer.best_height = self.chain.get_entry(&item.hash).map(|e| e.height).unwrap_or(peer.best_height);
                }
                if self.chain.is_orphan(&item.hash) {
                    let locator = self.chain.get_locator(Some(item.hash));
                    out.push(PoolAction::Send(
                        from,
                        Payload::GetBlocks(hsk_net::GetBlocksPayload { locator, stop: Hash::ZERO }),
                    ));
                    continue;
                }
            } else {
                let cap = match item.kind {
                    InvType::Tx => hsk_core::constants::MAX_TX_PENDING,
                    InvType::Claim | InvType::Airdrop => hsk_core::constants::MAX_CLAIM_PENDING,
                    _ => usize::MAX,
                };
                if self.requests.count_for_peer(item.kind, from) >= cap {
                    out.push(PoolAction::Disconnect(from, DisconnectReason::Banned));
                    return out;
                }
            }

            if !self.inv_seen.insert(item.hash) {
                continue;
            }
            let have = match item.kind {
                InvType::Block | InvType::FilteredBlock | InvType::CompactBlock => self.chain.has(&item.hash),
                InvType::Tx | InvType::Claim | InvType::Airdrop => self.mempool.has(&item.hash),
            };
            if have {
                self.broadcasts.ack(&item.hash, from, BROADCAST_ACK_THRESHOLD);
                continue;
            }
            if !self.requests.is_free(item.kind, &item.hash) {
                continue;
            }
            self.requests.claim(item.kind, item.hash, from, now);
            wanted.push(item);
        }
        if !wanted.is_empty() {
            out.push(PoolAction::Send(from, Payload::GetData(hsk_net::InvPayload { items: wanted })));
        }
        out
    }

    fn on_getdata(&mut self, from: PeerId, items: Vec<InvItem>) -> Vec<PoolAction> {
        let mut out = Vec::new();
        for item in items {
            // Any getdata for an object we're broadcasting counts as the
            // peer acking it (spec §4.6 scenario 5), regardless of kind.
            self.broadcasts.ack(&item.hash, from, BROADCAST_ACK_THRESHOLD);
            match item.kind {
                InvType::Block | InvType::FilteredBlock | InvType::CompactBlock => {
                    if let Some(entry) = self.chain.get_entry(&item.hash) {
                        out.push(PoolAction::Send(from, Payload::Block(entry.raw)));
                    }
                }
                InvType::Tx => {
                    if let Some(raw) = self.mempool.get_tx(&item.hash) {
                        out.push(PoolAction::Send(from, Payload::Tx(raw)));
                    }
                }
                InvType::Claim => {
                    if let Some(raw) = self.mempool.get_claim(&item.hash) {
                        out.push(PoolAction::Send(from, Payload::Claim(raw)));
                    }
                }
                InvType::Airdrop => {
                    if let Some(raw) = self.mempool.get_airdrop(&item.hash) {
                        out.push(PoolAction::Send(from, Payload::Airdrop(raw)));
                    }
                }
            }
        }
        out
    }

    fn on_reject(&mut self, r: hsk_net::RejectPayload) -> Vec<PoolAction> {
        self.broadcasts.reject(&r.data);
        Vec::new()
    }

    fn on_block(&mut self, from: PeerId, raw: Vec<u8>, now: Instant) -> Vec<PoolAction> {
        let hash = Hash::digest(&raw);
        self.requests.resolve(InvType::Block, &hash);
        self.chain.add_block(&raw);
        self.broadcasts.ack(&hash, from, BROADCAST_ACK_THRESHOLD);
        let _ = now;
        Vec::new()
    }

    fn on_tx(&mut self, from: PeerId, raw: Vec<u8>) -> Vec<PoolAction> {
        let hash = Hash::digest(&raw);
        self.requests.resolve(InvType::Tx, &hash);
        self.mempool.add_tx(&raw);
        self.broadcasts.ack(&hash, from, BROADCAST_ACK_THRESHOLD);
        Vec::new()
    }

    fn on_claim(&mut self, from: PeerId, raw: Vec<u8>) -> Vec<PoolAction> {
        let hash = Hash::digest(&raw);
        self.requests.resolve(InvType::Claim, &hash);
        self.mempool.add_claim(&raw);
        self.broadcasts.ack(&hash, from, BROADCAST_ACK_THRESHOLD);
        Vec::new()
    }

    fn on_airdrop(&mut self, from: PeerId, raw: Vec<u8>) -> Vec<PoolAction> {
        let hash = Hash::digest(&raw);
        self.requests.resolve(InvType::Airdrop, &hash);
        self.mempool.add_airdrop(&raw);
        self.broadcasts.ack(&hash, from, BROADCAST_ACK_THRESHOLD);
        Vec::new()
    }

    fn on_headers(&mut self, from: PeerId, headers: Vec<Vec<u8>>) -> Vec<PoolAction> {
        let mut out = Vec::new();
        for raw in headers {
            let height = self.chain.tip_height() + 1;
            match self.sync.accept_header(self.chain.as_ref(), &raw, height) {
                Some(_) => {}
                None => {
                    out.push(PoolAction::Disconnect(from, DisconnectReason::BadProtocol));
                    return out;
                }
            }
        }
        out
    }

    fn on_getblocks(&mut self, from: PeerId, locator: Vec<Hash>, stop: Hash) -> Vec<PoolAction> {
        let start = locator.into_iter().find(|h| self.chain.has(h));
        let mut hashes = Vec::new();
        let mut cursor = start.or_else(|| Some(self.chain.tip_hash()));
        while let Some(hash) = cursor {
            if hash == stop || hashes.len() >= hsk_core::constants::MAX_GETBLOCKS_HASHES {
                break;
            }
            match self.chain.get_next_hash(&hash) {
                Some(next) => {
                    hashes.push(InvItem { kind: InvType::Block, hash: next });
                    cursor = Some(next);
                }
                None => break,
            }
        }
        if hashes.is_empty() {
            Vec::new()
        } else {
            vec![PoolAction::Send(from, Payload::Inv(hsk_net::InvPayload { items: hashes }))]
        }
    }

    fn on_sendcmpct(&mut self, from: PeerId, enable: bool) -> Vec<PoolAction> {
        if let Some(peer) = self.slab.get_mut(from) {
            peer.compact_mode = if enable { CompactMode::HighBandwidth } else { CompactMode::LowBandwidth };
        }
        Vec::new()
    }

    fn on_cmpct_block(&mut self, from: PeerId, c: hsk_net::CmpctBlockPayload, now: Instant) -> Vec<PoolAction> {
        let header_hash = Hash::digest(&c.header);
        let prefilled = c
            .prefilled
            .into_iter()
            .map(|(index, raw)| crate::compact::PrefilledTx { index, raw })
            .collect();
        let mut reasm = Reassembler::new(c.header, header_hash, c.nonce, c.short_ids, prefilled);
        let candidates = self.mempool.snapshot();
        let missing = reasm.fill_from_mempool(candidates.iter().map(|(h, b)| (h, b.as_slice())));
        let Some(peer) = self.slab.get_mut(from) else { return Vec::new() };
        if missing.is_empty() {
            if let Some(block) = reasm.to_block() {
                self.chain.add_block(&block);
            }
            return Vec::new();
        }
        peer.compact_deadlines.insert(header_hash, now + STALL_TIMEOUT);
        peer.compact_blocks.insert(header_hash, reasm);
        vec![PoolAction::Send(
            from,
            Payload::GetBlockTxn(hsk_net::GetBlockTxnPayload { block_hash: header_hash, indexes: missing }),
        )]
    }

    fn on_get_block_txn(&mut self, from: PeerId, block_hash: Hash, indexes: Vec<u32>) -> Vec<PoolAction> {
        let Some(order) = self.sent_compact.get(&block_hash) else { return Vec::new() };
        let txs: Vec<Vec<u8>> = indexes
            .iter()
            .filter_map(|&i| order.get(i as usize))
            .filter_map(|hash| self.mempool.get_tx(hash))
            .collect();
        if txs.len() != indexes.len() {
            return Vec::new();
        }
        vec![PoolAction::Send(from, Payload::BlockTxn(hsk_net::BlockTxnPayload { block_hash, txs }))]
    }

    fn on_block_txn(&mut self, from: PeerId, block_hash: Hash, txs: Vec<Vec<u8>>) -> Vec<PoolAction> {
        let Some(peer) = self.slab.get_mut(from) else { return Vec::new() };
        let Some(reasm) = peer.compact_blocks.get_mut(&block_hash) else { return Vec::new() };
        for (slot, raw) in reasm.missing_slots().into_iter().zip(txs) {
            reasm.fill_missing(slot, raw);
        }
        if reasm.is_complete() {
            let block = reasm.to_block();
            peer.compact_blocks.remove(&block_hash);
            peer.compact_deadlines.remove(&block_hash);
            if let Some(block) = block {
                self.chain.add_block(&block);
            }
            return Vec::new();
        }

        // Still incomplete after the peer's fill: fall back to the full
        // block and penalize (spec §4.5 "else request full block and ban +10").
        peer.compact_blocks.remove(&block_hash);
        peer.compact_deadlines.remove(&block_hash);
        let mut out = vec![PoolAction::Send(
            from,
            Payload::GetData(hsk_net::InvPayload { items: vec![InvItem { kind: InvType::Block, hash: block_hash }] }),
        )];
        if let Some(peer) = self.slab.get_mut(from) {
            if peer.session.add_ban_score(hsk_core::constants::BAN_SCORE_GENERIC) {
                out.push(PoolAction::Disconnect(from, DisconnectReason::Banned));
            }
        }
        out
    }

    fn on_get_proof(&mut self, from: PeerId, key: Hash, root: Hash, now: Instant) -> Vec<PoolAction> {
        let Some(peer) = self.slab.get_mut(from) else { return Vec::new() };
        if !peer.session.allow_proof_request(now) {
            return vec![PoolAction::Disconnect(from, DisconnectReason::Banned)];
        }
        peer.proofs_served += 1;
        let _ = (key, root);
        Vec::new()
    }

    fn on_proof(&mut self, from: PeerId, nodes: Vec<Vec<u8>>) -> Vec<PoolAction> {
        // The key being resolved is whichever name_hash `from` is the
        // prover of; `resolve` is a no-op if nothing matches.
        let names: Vec<Hash> = self
            .slab
            .get(from)
            .map(|p| p.pending_proof.iter().copied().collect())
            .unwrap_or_default();
        for name_hash in names {
            if self.names.prover_of(&name_hash) == Some(from) {
                self.names.resolve(&name_hash, &nodes, self.proof_verifier.as_ref());
                if let Some(peer) = self.slab.get_mut(from) {
                    peer.pending_proof.remove(&name_hash);
                }
                break;
            }
        }
        Vec::new()
    }

    /// Resolves a name, joining an in-flight request for the same name
    /// if one exists (spec §4.9).
    pub fn resolve_name(&mut self, name_hash: Hash, root: Hash, now: Instant) -> Option<(oneshot::Receiver<Result<Option<Vec<u8>>>>, Option<PoolAction>)> {
        if let Some(rx) = self.names.join(&name_hash) {
            return Some((rx, None));
        }
        let candidates: Vec<(PeerId, u64, usize)> =
            self.slab.handshaked().map(|p| (p.id, p.proofs_served, p.pending_proof.len())).collect();
        let mut chance = || rand::random::<f64>();
        let prover = pick_prover(candidates.into_iter(), &mut chance)?;
        let rx = self.names.start(name_hash, root, prover);
        if let Some(peer) = self.slab.get_mut(prover) {
            peer.pending_proof.insert(name_hash);
        }
        let _ = now;
        Some((rx, Some(PoolAction::Send(prover, Payload::GetProof(hsk_net::GetProofPayload { key: name_hash, root })))))
    }

    /// Starts (or joins) a broadcast for a locally-originated object.
    pub fn broadcast(&mut self, kind: InvType, hash: Hash, now: Instant) -> oneshot::Receiver<Result<BroadcastOutcome>> {
        let rx = self.broadcasts.start(hash, now);
        for peer in self.slab.iter_mut() {
            peer.queue_inv(InvItem { kind, hash });
        }
        rx
    }

    /// Periodic maintenance: stall sweep, broadcast timeout sweep,
    /// outbound fill, and loader election (spec §4.6/§4.7/§4.8).
    pub fn tick(&mut self, now: Instant) -> Vec<PoolAction> {
        let mut out = Vec::new();
        for (kind, hash, peer) in self.requests.stalled(now, STALL_TIMEOUT) {
            self.requests.resolve(kind, &hash);
            self.inv_seen.forget(&hash);
            out.push(PoolAction::Disconnect(peer, DisconnectReason::PingTimeout));
        }
        self.broadcasts.sweep(now);
        elect_loader(&mut self.slab);

        let want = self.options.max_outbound.saturating_sub(self.slab.outbound_count());
        if want > 0 {
            let unix_now = self.unix_secs(now);
            for addr in pick_outbound_candidates(&mut self.book, &self.slab, &self.options, want, unix_now) {
                out.push(PoolAction::Connect(addr));
            }
        }
        out
    }

    pub fn on_peer_acked(&mut self, id: PeerId, now: Instant) {
        let unix_now = self.unix_secs(now);
        let services = self.slab.get(id).map(|p| p.services());
        let host = self.slab.get(id).map(|p| p.hostname());
        if let (Some(host), Some(services)) = (host, services) {
            self.book.mark_ack(&host, services, unix_now);
        }
    }
}

