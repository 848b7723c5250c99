//! Per-connection state machine (spec §4.4): handshake, keep-alive,
//! inventory/address dedup and flush batching, outstanding-request
//! tracking with stall detection, and ban scoring. Deliberately
//! synchronous and IO-free, the same way the teacher's `network::Session`
//! is a plain struct driven by an `IoContext` rather than holding a
//! socket itself — the pool owns the socket and timers and feeds this
//! type events.

use crate::error::NetworkError;
use crate::messages::{Payload, PingPongPayload, VersionPayload};
use hsk_core::constants::{
    BAN_SCORE_THRESHOLD, IDLE_TIMEOUT_SECS, INV_FILTER_CAPACITY, INV_FILTER_FPR,
    INV_FLUSH_EAGER_THRESHOLD, INV_FLUSH_MAX_ITEMS, MAX_BLOCK_PENDING, MAX_CLAIM_PENDING,
    MAX_TX_PENDING, PING_INTERVAL_SECS, REQUEST_TIMEOUT_SECS,
};
use hsk_core::{InvItem, InvType, NetAddress, Services};
use crate::bloom::RollingFilter;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const ADDR_FILTER_CAPACITY: usize = hsk_core::constants::ADDR_FILTER_CAPACITY;
const ADDR_FILTER_FPR: f64 = 1e-3;

/// What the caller (the pool) should do in response to a state transition.
#[derive(Debug)]
pub enum Action {
    Send(Payload),
    Deliver(Payload),
    AddBanScore(u32),
    Disconnect(crate::error::DisconnectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    Handshaking,
    Done,
}

pub struct SessionConfig {
    pub our_version: u32,
    pub our_services: Services,
    pub our_agent: String,
    pub our_height: u32,
    pub our_nonce: u64,
    pub outbound: bool,
}

struct RateLimiter {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    fn new(capacity: f64, refill_per_sec: f64, now: Instant) -> RateLimiter {
        RateLimiter { tokens: capacity, capacity, refill_per_sec, last_refill: now }
    }

    fn allow(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

fn pending_cap(kind: InvType) -> usize {
    match kind {
        InvType::Block | InvType::FilteredBlock | InvType::CompactBlock => MAX_BLOCK_PENDING,
        InvType::Tx => MAX_TX_PENDING,
        InvType::Claim | InvType::Airdrop => MAX_CLAIM_PENDING,
    }
}

/// Per-connection state: handshake progress, dedup filters, pending
/// requests and their deadlines, and ban score. Holds no socket and runs
/// no timers of its own; `check_ping`/`check_stall`/`check_idle` are
/// meant to be called periodically by the pool's single timer loop.
pub struct PeerSession {
    config: SessionConfig,
    stage: Stage,
    sent_version: bool,
    received_version: bool,
    sent_verack: bool,
    received_verack: bool,
    pub remote_version: Option<VersionPayload>,
    ban_score: u32,
    inv_filter: RollingFilter,
    addr_filter: RollingFilter,
    outbound_inv_queue: Vec<InvItem>,
    last_inv_flush: Instant,
    pending_requests: HashMap<InvItem, Instant>,
    pending_counts: HashMap<InvType, usize>,
    outstanding_ping: Option<(u64, Instant)>,
    last_activity: Instant,
    proof_limiter: RateLimiter,
}

impl PeerSession {
    pub fn new(config: SessionConfig, now: Instant) -> PeerSession {
        PeerSession {
            config,
            stage: Stage::Init,
            sent_version: false,
            received_version: false,
            sent_verack: false,
            received_verack: false,
            remote_version: None,
            ban_score: 0,
            inv_filter: RollingFilter::new(INV_FILTER_CAPACITY, INV_FILTER_FPR),
            addr_filter: RollingFilter::new(ADDR_FILTER_CAPACITY, ADDR_FILTER_FPR),
            outbound_inv_queue: Vec::new(),
            last_inv_flush: now,
            pending_requests: HashMap::new(),
            pending_counts: HashMap::new(),
            outstanding_ping: None,
            last_activity: now,
            proof_limiter: RateLimiter::new(20.0, 5.0, now),
        }
    }

    pub fn is_handshake_done(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn ban_score(&self) -> u32 {
        self.ban_score
    }

    /// Called once, immediately after the transport is ready, to kick off
    /// the handshake by sending our own `version`. `unix_time` is the wall
    /// clock time to advertise; `now` is the monotonic clock this session
    /// uses for every other timer.
    pub fn start(&mut self, remote: NetAddress, now: Instant, unix_time: u64) -> Vec<Action> {
        self.stage = Stage::Handshaking;
        self.last_activity = now;
        self.sent_version = true;
        vec![Action::Send(Payload::Version(VersionPayload {
            version: self.config.our_version,
            services: self.config.our_services,
            time: unix_time,
            remote,
            nonce: self.config.our_nonce,
            agent: self.config.our_agent.clone(),
            height: self.config.our_height,
            no_relay: false,
        }))]
    }

    fn bump_ban(&mut self, amount: u32) -> Vec<Action> {
        if self.add_ban_score(amount) {
            vec![Action::AddBanScore(amount), Action::Disconnect(crate::error::DisconnectReason::Banned)]
        } else {
            vec![Action::AddBanScore(amount)]
        }
    }

    /// Applies a ban-score penalty decided outside the packet-handling
    /// pipeline (e.g. the pool penalizing a failed compact-block
    /// reassembly). Returns `true` once the threshold is crossed.
    pub fn add_ban_score(&mut self, amount: u32) -> bool {
        self.ban_score += amount;
        self.ban_score >= BAN_SCORE_THRESHOLD
    }

    /// Feeds one decoded payload into the state machine.
    pub fn handle(&mut self, payload: Payload, now: Instant) -> Vec<Action> {
        self.last_activity = now;
        if self.stage != Stage::Done && !matches!(payload, Payload::Version(_) | Payload::Verack) {
            return vec![Action::Disconnect(crate::error::DisconnectReason::BadProtocol)];
        }

        match payload {
            Payload::Version(v) => self.handle_version(v),
            Payload::Verack => self.handle_verack(),
            Payload::Ping(p) => {
                // A zero nonce is a liveness probe only; spec: ignored
                // without a pong and without error (§8 "Boundary behaviors").
                if p.nonce == 0 {
                    Vec::new()
                } else {
                    vec![Action::Send(Payload::Pong(p))]
                }
            }
            Payload::Pong(p) => self.handle_pong(p),
            Payload::Inv(mut inv) => {
                inv.items.retain(|item| !self.inv_filter.insert_and_check(item_key(item).as_slice()));
                if inv.items.is_empty() {
                    Vec::new()
                } else {
                    vec![Action::Deliver(Payload::Inv(inv))]
                }
            }
            Payload::Addr(mut addr) => {
                addr.addrs.retain(|a| !self.addr_filter.insert_and_check(a.canonical_host().as_bytes()));
                if addr.addrs.is_empty() {
                    Vec::new()
                } else {
                    vec![Action::Deliver(Payload::Addr(addr))]
                }
            }
            other => vec![Action::Deliver(other)],
        }
    }

    fn handle_version(&mut self, v: VersionPayload) -> Vec<Action> {
        if self.received_version {
            let mut actions = self.bump_ban(hsk_core::constants::BAN_SCORE_GENERIC);
            actions.insert(0, Action::Disconnect(crate::error::DisconnectReason::BadProtocol));
            return actions;
        }
        if v.nonce == self.config.our_nonce {
            return vec![Action::Disconnect(crate::error::DisconnectReason::UselessPeer)];
        }
        self.received_version = true;
        self.remote_version = Some(v);
        let mut actions = Vec::new();
        if !self.sent_verack {
            self.sent_verack = true;
            actions.push(Action::Send(Payload::Verack));
        }
        self.maybe_finish_handshake();
        actions
    }

    fn handle_verack(&mut self) -> Vec<Action> {
        if self.received_verack {
            return self.bump_ban(hsk_core::constants::BAN_SCORE_GENERIC);
        }
        self.received_verack = true;
        self.maybe_finish_handshake();
        Vec::new()
    }

    fn maybe_finish_handshake(&mut self) {
        if self.sent_version && self.received_version && self.sent_verack && self.received_verack {
            self.stage = Stage::Done;
        }
    }

    fn handle_pong(&mut self, p: PingPongPayload) -> Vec<Action> {
        match self.outstanding_ping {
            Some((nonce, _)) if nonce == p.nonce => {
                self.outstanding_ping = None;
                Vec::new()
            }
            _ => self.bump_ban(hsk_core::constants::BAN_SCORE_GENERIC),
        }
    }

    /// Queues an inventory item for the next flush, skipping items this
    /// peer has already announced or been told about. Returns `true` if
    /// the caller should flush immediately (queue crossed the eager
    /// threshold) rather than waiting for the next tick.
    pub fn queue_inv(&mut self, item: InvItem) -> bool {
        if self.inv_filter.insert_and_check(item_key(&item).as_slice()) {
            return false;
        }
        self.outbound_inv_queue.push(item);
        self.outbound_inv_queue.len() >= INV_FLUSH_EAGER_THRESHOLD
    }

    pub fn queue_addr(&mut self, addr: NetAddress) -> Option<NetAddress> {
        if self.addr_filter.insert_and_check(addr.canonical_host().as_bytes()) {
            None
        } else {
            Some(addr)
        }
    }

    /// Drains the outbound inventory queue into a single `inv` message, if
    /// the interval elapsed or the caller forced it (via the eager
    /// threshold return from `queue_inv`).
    pub fn flush_inv(&mut self, now: Instant, force: bool) -> Option<Payload> {
        let elapsed = now.saturating_duration_since(self.last_inv_flush)
            >= Duration::from_secs(hsk_core::constants::INV_FLUSH_INTERVAL_SECS);
        if self.outbound_inv_queue.is_empty() || !(force || elapsed) {
            return None;
        }
        self.last_inv_flush = now;
        let drained: Vec<InvItem> =
            self.outbound_inv_queue.drain(..self.outbound_inv_queue.len().min(INV_FLUSH_MAX_ITEMS)).collect();
        Some(Payload::Inv(crate::messages::InvPayload { items: drained }))
    }

    /// Registers that we've asked this peer for `item`, enforcing the
    /// per-kind resource caps from spec §7 (`ErrorKind::Resource`).
    pub fn note_request(&mut self, item: InvItem, now: Instant) -> Result<(), NetworkError> {
        let count = self.pending_counts.entry(item.kind).or_insert(0);
        if *count >= pending_cap(item.kind) {
            return Err(NetworkError::Resource);
        }
        *count += 1;
        self.pending_requests.insert(item, now);
        Ok(())
    }

    /// Clears a pending request when the matching data arrives. Returns
    /// `false` if nothing was pending for `item` (an unsolicited
    /// response, worth a small ban bump by the caller).
    pub fn resolve_request(&mut self, item: &InvItem) -> bool {
        if self.pending_requests.remove(item).is_some() {
            if let Some(count) = self.pending_counts.get_mut(&item.kind) {
                *count = count.saturating_sub(1);
            }
            true
        } else {
            false
        }
    }

    /// Checks for any request past its deadline. A single stalled request
    /// is enough to disconnect — the peer promised data it didn't
    /// deliver.
    pub fn check_stall(&mut self, now: Instant) -> Vec<Action> {
        let deadline = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        let stalled = self
            .pending_requests
            .values()
            .any(|sent_at| now.saturating_duration_since(*sent_at) > deadline);
        if stalled {
            vec![Action::Disconnect(crate::error::DisconnectReason::UselessPeer)]
        } else {
            Vec::new()
        }
    }

    pub fn check_ping(&mut self, now: Instant, nonce: u64) -> Vec<Action> {
        if self.stage != Stage::Done {
            return Vec::new();
        }
        match self.outstanding_ping {
            None => {
                if now.saturating_duration_since(self.last_activity) >= Duration::from_secs(PING_INTERVAL_SECS) {
                    self.outstanding_ping = Some((nonce, now));
                    vec![Action::Send(Payload::Ping(PingPongPayload { nonce }))]
                } else {
                    Vec::new()
                }
            }
            Some((_, sent_at)) => {
                if now.saturating_duration_since(sent_at) >= Duration::from_secs(PING_INTERVAL_SECS * 2) {
                    vec![Action::Disconnect(crate::error::DisconnectReason::PingTimeout)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn check_idle(&self, now: Instant) -> Vec<Action> {
        if now.saturating_duration_since(self.last_activity) >= Duration::from_secs(IDLE_TIMEOUT_SECS) {
            vec![Action::Disconnect(crate::error::DisconnectReason::PingTimeout)]
        } else {
            Vec::new()
        }
    }

    /// Token-bucket gate for `getproof`/`proof` traffic, which is cheap to
    /// request and comparatively expensive to answer.
    pub fn allow_proof_request(&mut self, now: Instant) -> bool {
        self.proof_limiter.allow(now)
    }
}

fn item_key(item: &InvItem) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(match item.kind {
        InvType::Block => 0,
        InvType::Tx => 1,
        InvType::Claim => 2,
        InvType::Airdrop => 3,
        InvType::FilteredBlock => 4,
        InvType::CompactBlock => 5,
    });
    key.extend_from_slice(item.hash.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsk_core::Hash;
    use std::net::{IpAddr, Ipv4Addr};

    fn config(nonce: u64, outbound: bool) -> SessionConfig {
        SessionConfig {
            our_version: 1,
            our_services: Services::NETWORK,
            our_agent: "/test:0.1.0/".into(),
            our_height: 0,
            our_nonce: nonce,
            outbound,
        }
    }

    fn remote_addr() -> NetAddress {
        NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 13038)
    }

    fn remote_version(nonce: u64) -> VersionPayload {
        VersionPayload {
            version: 1,
            services: Services::NETWORK,
            time: 0,
            remote: remote_addr(),
            nonce,
            agent: "/peer:0.1.0/".into(),
            height: 10,
            no_relay: false,
        }
    }

    #[test]
    fn handshake_completes_after_version_and_verack_both_ways() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(1, true), now);
        session.start(remote_addr(), now, 0);
        assert!(!session.is_handshake_done());

        let actions = session.handle(Payload::Version(remote_version(2)), now);
        assert!(actions.iter().any(|a| matches!(a, Action::Send(Payload::Verack))));
        assert!(!session.is_handshake_done());

        let actions = session.handle(Payload::Verack, now);
        assert!(actions.is_empty());
        assert!(session.is_handshake_done());
    }

    #[test]
    fn self_connect_nonce_is_rejected() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(42, true), now);
        session.start(remote_addr(), now, 0);
        let actions = session.handle(Payload::Version(remote_version(42)), now);
        assert!(matches!(actions[0], Action::Disconnect(crate::error::DisconnectReason::UselessPeer)));
    }

    #[test]
    fn duplicate_version_bans_and_disconnects() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(1, true), now);
        session.start(remote_addr(), now, 0);
        session.handle(Payload::Version(remote_version(2)), now);
        let actions = session.handle(Payload::Version(remote_version(3)), now);
        assert!(actions.iter().any(|a| matches!(a, Action::Disconnect(_))));
    }

    #[test]
    fn non_handshake_packet_before_done_is_rejected() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(1, true), now);
        session.start(remote_addr(), now, 0);
        let actions = session.handle(Payload::GetAddr, now);
        assert!(matches!(actions[0], Action::Disconnect(crate::error::DisconnectReason::BadProtocol)));
    }

    #[test]
    fn inventory_dedup_drops_repeated_items() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(1, true), now);
        let item = InvItem { kind: InvType::Tx, hash: Hash::digest(b"x") };
        let payload = Payload::Inv(crate::messages::InvPayload { items: vec![item] });
        session.stage = Stage::Done;
        let first = session.handle(payload.clone(), now);
        assert!(matches!(first.as_slice(), [Action::Deliver(_)]));
        let second = session.handle(payload, now);
        assert!(second.is_empty());
    }

    #[test]
    fn stalled_request_triggers_disconnect() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(1, true), now);
        let item = InvItem { kind: InvType::Block, hash: Hash::digest(b"b") };
        session.note_request(item, now).unwrap();
        let later = now + Duration::from_secs(REQUEST_TIMEOUT_SECS + 1);
        let actions = session.check_stall(later);
        assert!(matches!(actions[0], Action::Disconnect(crate::error::DisconnectReason::UselessPeer)));
    }

    #[test]
    fn resource_cap_is_enforced_per_kind() {
        let now = Instant::now();
        let mut session = PeerSession::new(config(1, true), now);
        for i in 0..MAX_CLAIM_PENDING {
            let item = InvItem { kind: InvType::Claim, hash: Hash::digest(format!("c{i}").as_bytes()) };
            session.note_request(item, now).unwrap();
        }
        let overflow = InvItem { kind: InvType::Claim, hash: Hash::digest(b"overflow") };
        assert!(session.note_request(overflow, now).is_err());
    }
}
