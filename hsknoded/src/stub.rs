//! Minimal in-process stand-ins for the `Chain` and `Mempool`
//! collaborators (spec §1 "Out of scope": consensus validation and
//! transaction-pool logic are consumed only at their interface). A real
//! deployment links an actual consensus engine and mempool here; these
//! let the node binary boot and drive the networking core end to end
//! without one, the way a unit test's fake chain does but wired for
//! a live process instead of `#[cfg(test)]`.

use std::collections::HashMap;
use std::sync::RwLock;

use hsk_core::Hash;
use hsk_pool::{Chain, ChainEntry, Mempool};

pub struct StubChain {
    genesis: Hash,
    entries: RwLock<HashMap<Hash, ChainEntry>>,
    tip: RwLock<Hash>,
    checkpoints: Vec<(u32, Hash)>,
}

impl StubChain {
    pub fn new(genesis: Hash) -> StubChain {
        let entry = ChainEntry { hash: genesis, prev_block: Hash::ZERO, height: 0, raw: Vec::new() };
        let mut entries = HashMap::new();
        entries.insert(genesis, entry);
        StubChain {
            genesis,
            entries: RwLock::new(entries),
            tip: RwLock::new(genesis),
            checkpoints: Vec::new(),
        }
    }
}

impl Chain for StubChain {
    fn add_block(&self, raw: &[u8]) -> bool {
        let hash = Hash::digest(raw);
        let prev = Hash::digest(&raw[0..32.min(raw.len())]);
        let height = self.entries.read().unwrap().get(&prev).map(|e| e.height + 1).unwrap_or(0);
        self.entries.write().unwrap().insert(
            hash,
            ChainEntry { hash, prev_block: prev, height, raw: raw.to_vec() },
        );
        *self.tip.write().unwrap() = hash;
        true
    }

    fn has(&self, hash: &Hash) -> bool {
        self.entries.read().unwrap().contains_key(hash)
    }

    fn is_orphan(&self, _hash: &Hash) -> bool {
        false
    }

    fn get_locator(&self, from: Option<Hash>) -> Vec<Hash> {
        vec![from.unwrap_or(*self.tip.read().unwrap())]
    }

    fn get_entry(&self, hash: &Hash) -> Option<ChainEntry> {
        self.entries.read().unwrap().get(hash).cloned()
    }

    fn get_next_hash(&self, _hash: &Hash) -> Option<Hash> {
        None
    }

    fn tip_height(&self) -> u32 {
        self.entries.read().unwrap().get(&*self.tip.read().unwrap()).map(|e| e.height).unwrap_or(0)
    }

    fn tip_hash(&self) -> Hash {
        *self.tip.read().unwrap()
    }

    fn is_synced(&self) -> bool {
        false
    }

    fn verify_header(&self, raw: &[u8], prev: Option<&ChainEntry>) -> Option<ChainEntry> {
        let hash = Hash::digest(raw);
        let prev_hash = prev.map(|p| p.hash).unwrap_or(self.genesis);
        let height = prev.map(|p| p.height + 1).unwrap_or(0);
        Some(ChainEntry { hash, prev_block: prev_hash, height, raw: raw.to_vec() })
    }

    fn checkpoints(&self) -> &[(u32, Hash)] {
        &self.checkpoints
    }
}

pub struct StubMempool {
    txs: RwLock<HashMap<Hash, Vec<u8>>>,
    claims: RwLock<HashMap<Hash, Vec<u8>>>,
    airdrops: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl StubMempool {
    pub fn new() -> StubMempool {
        StubMempool {
            txs: RwLock::new(HashMap::new()),
            claims: RwLock::new(HashMap::new()),
            airdrops: RwLock::new(HashMap::new()),
        }
    }
}

impl Mempool for StubMempool {
    fn add_tx(&self, raw: &[u8]) -> bool {
        self.txs.write().unwrap().insert(Hash::digest(raw), raw.to_vec());
        true
    }

    fn add_claim(&self, raw: &[u8]) -> bool {
        self.claims.write().unwrap().insert(Hash::digest(raw), raw.to_vec());
        true
    }

    fn add_airdrop(&self, raw: &[u8]) -> bool {
        self.airdrops.write().unwrap().insert(Hash::digest(raw), raw.to_vec());
        true
    }

    fn get_tx(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.txs.read().unwrap().get(hash).cloned()
    }

    fn get_claim(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.claims.read().unwrap().get(hash).cloned()
    }

    fn get_airdrop(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.airdrops.read().unwrap().get(hash).cloned()
    }

    fn has(&self, hash: &Hash) -> bool {
        self.txs.read().unwrap().contains_key(hash)
            || self.claims.read().unwrap().contains_key(hash)
            || self.airdrops.read().unwrap().contains_key(hash)
    }

    fn has_reject(&self, _hash: &Hash) -> bool {
        false
    }

    fn snapshot(&self) -> Vec<(Hash, Vec<u8>)> {
        self.txs.read().unwrap().iter().map(|(h, b)| (*h, b.clone())).collect()
    }
}

pub struct NullProofVerifier;

impl hsk_pool::ProofVerifier for NullProofVerifier {
    fn verify(&self, _root: &Hash, _key: &Hash, _nodes: &[Vec<u8>]) -> Result<Option<Vec<u8>>, ()> {
        Err(())
    }
}
