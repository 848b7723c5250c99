//! Broadcast lifecycle (spec §4.8): sending out a locally-originated tx,
//! claim, or block and tracking whether the network accepted it. A
//! broadcast resolves on first reject, on ack from enough peers, or on
//! timeout — whichever comes first — via a one-shot channel so the
//! caller can simply `.await` the outcome.

use hsk_core::Hash;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::error::{PoolError, Result};
use crate::peer::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted,
    Rejected,
}

struct Pending {
    deadline: Instant,
    acked_by: Vec<PeerId>,
    responder: Option<oneshot::Sender<Result<BroadcastOutcome>>>,
}

/// Tracks outstanding broadcasts by object hash. One entry per hash; a
/// second broadcast of the same object just piggybacks on the first.
#[derive(Default)]
pub struct BroadcastTracker {
    pending: HashMap<Hash, Pending>,
    timeout: Duration,
}

impl BroadcastTracker {
    pub fn new(timeout: Duration) -> BroadcastTracker {
        BroadcastTracker { pending: HashMap::new(), timeout }
    }

    /// Registers a new broadcast, returning the receiver the caller
    /// awaits for the final outcome.
    pub fn start(&mut self, hash: Hash, now: Instant) -> oneshot::Receiver<Result<BroadcastOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            hash,
            Pending { deadline: now + self.timeout, acked_by: Vec::new(), responder: Some(tx) },
        );
        rx
    }

    pub fn is_pending(&self, hash: &Hash) -> bool {
        self.pending.contains_key(hash)
    }

    /// Records an ack (`getdata` for this hash, i.e. a peer relaying it
    /// back) and resolves the broadcast once `threshold` distinct peers
    /// have acked.
    pub fn ack(&mut self, hash: &Hash, peer: PeerId, threshold: usize) {
        if let Some(entry) = self.pending.get_mut(hash) {
            if !entry.acked_by.contains(&peer) {
                entry.acked_by.push(peer);
            }
            if entry.acked_by.len() >= threshold {
                if let Some(entry) = self.pending.remove(hash) {
                    if let Some(tx) = entry.responder {
                        let _ = tx.send(Ok(BroadcastOutcome::Accepted));
                    }
                }
            }
        }
    }

    /// A peer explicitly rejected the object (`reject` message); fails
    /// the broadcast immediately rather than waiting for the timeout.
    pub fn reject(&mut self, hash: &Hash) {
        if let Some(entry) = self.pending.remove(hash) {
            if let Some(tx) = entry.responder {
                let _ = tx.send(Err(PoolError::BroadcastRejected));
            }
        }
    }

    /// Sweeps expired entries, resolving them as timeouts. Call on a
    /// periodic tick alongside stall/ping checks.
    pub fn sweep(&mut self, now: Instant) {
        let expired: Vec<Hash> = self
            .pending
            .iter()
            .filter(|(_, entry)| now >= entry.deadline)
            .map(|(hash, _)| *hash)
            .collect();
        for hash in expired {
            if let Some(entry) = self.pending.remove(&hash) {
                if let Some(tx) = entry.responder {
                    let _ = tx.send(Err(PoolError::BroadcastTimeout));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acks_past_threshold_resolve_accepted() {
        let mut tracker = BroadcastTracker::new(Duration::from_secs(60));
        let hash = Hash::digest(b"tx");
        let now = Instant::now();
        let mut rx = tracker.start(hash, now);
        tracker.ack(&hash, 1, 2);
        assert!(rx.try_recv().is_err());
        tracker.ack(&hash, 2, 2);
        assert_eq!(rx.try_recv().unwrap().unwrap(), BroadcastOutcome::Accepted);
    }

    #[test]
    fn reject_resolves_immediately_as_error() {
        let mut tracker = BroadcastTracker::new(Duration::from_secs(60));
        let hash = Hash::digest(b"tx2");
        let mut rx = tracker.start(hash, Instant::now());
        tracker.reject(&hash);
        assert!(matches!(rx.try_recv().unwrap(), Err(PoolError::BroadcastRejected)));
    }

    #[test]
    fn sweep_past_deadline_resolves_timeout() {
        let mut tracker = BroadcastTracker::new(Duration::from_millis(1));
        let hash = Hash::digest(b"tx3");
        let now = Instant::now();
        let mut rx = tracker.start(hash, now);
        tracker.sweep(now + Duration::from_millis(2));
        assert!(matches!(rx.try_recv().unwrap(), Err(PoolError::BroadcastTimeout)));
    }
}
