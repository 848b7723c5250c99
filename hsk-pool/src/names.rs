//! Name-proof resolution (spec §4.9 "resolve(name_hash)"): looks up the
//! value committed to a name in the chain's authenticated tree by
//! picking a prover, issuing `getproof`, and verifying the response.
//! Proof verification itself is delegated (spec §1 Non-goals
//! "authenticated-tree proof verification") behind `ProofVerifier`.

use hsk_core::Hash;
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::error::{PoolError, Result};
use crate::peer::PeerId;

/// The delegated tree-proof checker (design note §9 callback hook).
/// Out of scope: the Urkel-tree/Merkle algorithm behind it.
pub trait ProofVerifier: Send + Sync {
    /// Verifies `nodes` proves `key`'s value against `root`. `Ok(Some(value))`
    /// on a proof of existence, `Ok(None)` on a proof of absence, `Err` if
    /// the proof itself doesn't check out.
    fn verify(&self, root: &Hash, key: &Hash, nodes: &[Vec<u8>]) -> std::result::Result<Option<Vec<u8>>, ()>;
}

struct PendingProof {
    root: Hash,
    prover: PeerId,
    waiters: Vec<oneshot::Sender<Result<Option<Vec<u8>>>>>,
}

/// Tracks in-flight `nameMap` entries and dedups concurrent resolves of
/// the same name onto a single outstanding request (spec §4.9 "if an
/// in-flight request exists, join it").
#[derive(Default)]
pub struct NameResolver {
    pending: HashMap<Hash, PendingProof>,
}

impl NameResolver {
    pub fn new() -> NameResolver {
        NameResolver::default()
    }

    pub fn is_pending(&self, name_hash: &Hash) -> bool {
        self.pending.contains_key(name_hash)
    }

    /// Joins an existing request for `name_hash`, or returns `None` if the
    /// caller must start a fresh one (and call `start`).
    pub fn join(&mut self, name_hash: &Hash) -> Option<oneshot::Receiver<Result<Option<Vec<u8>>>>> {
        let entry = self.pending.get_mut(name_hash)?;
        let (tx, rx) = oneshot::channel();
        entry.waiters.push(tx);
        Some(rx)
    }

    pub fn start(&mut self, name_hash: Hash, root: Hash, prover: PeerId) -> oneshot::Receiver<Result<Option<Vec<u8>>>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(name_hash, PendingProof { root, prover, waiters: vec![tx] });
        rx
    }

    /// Resolves a `proof` response, verifying it against the root that
    /// was committed when the request started (not whatever root the
    /// peer claims now).
    pub fn resolve(&mut self, name_hash: &Hash, nodes: &[Vec<u8>], verifier: &dyn ProofVerifier) {
        let Some(entry) = self.pending.remove(name_hash) else { return };
        let value = verifier.verify(&entry.root, name_hash, nodes);
        for waiter in entry.waiters {
            let outcome = match &value {
                Ok(v) => Ok(v.clone()),
                Err(()) => Err(PoolError::BadProof),
            };
            let _ = waiter.send(outcome);
        }
    }

    /// Fails every waiter on `name_hash` with a fresh `PoolError::NoLoader`
    /// (the only way a name resolve can fail before a proof even arrives:
    /// no eligible prover was available).
    pub fn fail_no_prover(&mut self, name_hash: &Hash) {
        if let Some(entry) = self.pending.remove(name_hash) {
            for waiter in entry.waiters {
                let _ = waiter.send(Err(PoolError::NoLoader));
            }
        }
    }

    pub fn prover_of(&self, name_hash: &Hash) -> Option<PeerId> {
        self.pending.get(name_hash).map(|e| e.prover)
    }
}

/// Picks a prover favoring peers with more proofs served and a smaller
/// pending-request map, with a randomized tie-break (spec §4.9).
pub fn pick_prover<'a>(
    candidates: impl Iterator<Item = (PeerId, u64, usize)> + 'a,
    chance: &mut dyn FnMut() -> f64,
) -> Option<PeerId> {
    let mut best: Vec<(PeerId, u64, usize)> = candidates.collect();
    if best.is_empty() {
        return None;
    }
    best.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let top_score = (best[0].1, best[0].2);
    let tied: Vec<PeerId> = best.iter().filter(|c| (c.1, c.2) == top_score).map(|c| c.0).collect();
    let idx = (chance() * tied.len() as f64) as usize;
    Some(tied[idx.min(tied.len() - 1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysValid;
    impl ProofVerifier for AlwaysValid {
        fn verify(&self, _root: &Hash, _key: &Hash, _nodes: &[Vec<u8>]) -> std::result::Result<Option<Vec<u8>>, ()> {
            Ok(Some(b"value".to_vec()))
        }
    }

    #[test]
    fn second_resolve_joins_first_instead_of_duplicating() {
        let mut resolver = NameResolver::new();
        let name = Hash::digest(b"example");
        let _rx1 = resolver.start(name, Hash::ZERO, 1);
        assert!(resolver.is_pending(&name));
        let rx2 = resolver.join(&name);
        assert!(rx2.is_some());
    }

    #[test]
    fn resolve_delivers_value_to_every_waiter() {
        let mut resolver = NameResolver::new();
        let name = Hash::digest(b"example2");
        let rx1 = resolver.start(name, Hash::ZERO, 1);
        let rx2 = resolver.join(&name).unwrap();
        resolver.resolve(&name, &[], &AlwaysValid);
        assert_eq!(rx1.try_recv().unwrap().unwrap(), Some(b"value".to_vec()));
        assert_eq!(rx2.try_recv().unwrap().unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn prover_pick_favors_more_proofs_served_then_smaller_pending() {
        let candidates = vec![(1u64, 10u64, 5usize), (2u64, 20u64, 1usize)];
        let mut chance = || 0.0;
        let picked = pick_prover(candidates.into_iter(), &mut chance);
        assert_eq!(picked, Some(2));
    }
}
