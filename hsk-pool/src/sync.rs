//! Header-first sync strategy (spec §4.6): while checkpoints remain
//! ahead of us, request headers in bulk and verify them against the
//! checkpoint hashes without committing blocks; once past the last
//! checkpoint, fall back to `getblocks`-driven inventory sync.

use hsk_core::Hash;
use std::time::Instant;

use crate::chain::{Chain, ChainEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    HeadersFirst,
    GetBlocks,
}

/// One entry in the pool's own pre-commit header list (spec §4.6
/// "headerTip/headerNext"), linked the same way the chain links
/// committed entries but kept separate until blocks actually arrive.
#[derive(Debug, Clone)]
struct HeaderNode {
    entry: ChainEntry,
}

/// Tracks the headers-first walk independently of the `Chain`
/// collaborator, so header verification can race ahead of block
/// download without corrupting the committed chain.
pub struct SyncState {
    mode: SyncMode,
    header_chain: Vec<HeaderNode>,
    header_tip: Hash,
    last_request: Option<Instant>,
}

impl SyncState {
    pub fn new(genesis: Hash) -> SyncState {
        SyncState { mode: SyncMode::HeadersFirst, header_chain: Vec::new(), header_tip: genesis, last_request: None }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn header_tip(&self) -> Hash {
        self.header_tip
    }

    /// Verifies and links one header against the running header chain
    /// and, if checkpoints remain, the checkpoint for its height. On
    /// success the header tip advances; on failure the peer that sent
    /// it should be penalized by the caller.
    pub fn accept_header(&mut self, chain: &dyn Chain, raw: &[u8], height: u32) -> Option<Hash> {
        let prev = self.header_chain.last().map(|n| &n.entry);
        let entry = chain.verify_header(raw, prev)?;
        if entry.height != height {
            return None;
        }
        if let Some((_, expected)) = chain.checkpoints().iter().find(|(h, _)| *h == height) {
            if entry.hash != *expected {
                return None;
            }
        }
        self.header_tip = entry.hash;
        self.header_chain.push(HeaderNode { entry: entry.clone() });
        if chain.checkpoints().iter().all(|(h, _)| *h <= height) {
            self.mode = SyncMode::GetBlocks;
        }
        Some(entry.hash)
    }

    pub fn note_request(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    pub fn is_stalled(&self, now: Instant, timeout: std::time::Duration) -> bool {
        match self.last_request {
            Some(last) => now.duration_since(last) > timeout,
            None => false,
        }
    }

    /// Builds a block-locator the way `getblocks`/`getheaders` want it:
    /// our header tip first, falling back to the chain's own locator
    /// once the header-only list is exhausted.
    pub fn locator(&self, chain: &dyn Chain) -> Vec<Hash> {
        if self.header_chain.is_empty() {
            return chain.get_locator(None);
        }
        let mut hashes: Vec<Hash> = Vec::new();
        let mut step = 1usize;
        let mut idx = self.header_chain.len();
        while idx > 0 {
            idx = idx.saturating_sub(step);
            hashes.push(self.header_chain[idx].entry.hash);
            if hashes.len() >= 10 {
                step *= 2;
            }
            if idx == 0 {
                break;
            }
        }
        hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainEntry;
    use std::cell::RefCell;

    struct FakeChain {
        checkpoints: Vec<(u32, Hash)>,
        accept: RefCell<bool>,
    }

    impl Chain for FakeChain {
        fn add_block(&self, _raw: &[u8]) -> bool {
            true
        }
        fn has(&self, _hash: &Hash) -> bool {
            false
        }
        fn is_orphan(&self, _hash: &Hash) -> bool {
            false
        }
        fn get_locator(&self, _from: Option<Hash>) -> Vec<Hash> {
            vec![]
        }
        fn get_entry(&self, _hash: &Hash) -> Option<ChainEntry> {
            None
        }
        fn get_next_hash(&self, _hash: &Hash) -> Option<Hash> {
            None
        }
        fn tip_height(&self) -> u32 {
            0
        }
        fn tip_hash(&self) -> Hash {
            Hash::ZERO
        }
        fn is_synced(&self) -> bool {
            false
        }
        fn verify_header(&self, raw: &[u8], prev: Option<&ChainEntry>) -> Option<ChainEntry> {
            if !*self.accept.borrow() {
                return None;
            }
            let height = prev.map(|p| p.height + 1).unwrap_or(0);
            Some(ChainEntry { hash: Hash::digest(raw), prev_block: prev.map(|p| p.hash).unwrap_or(Hash::ZERO), height, raw: raw.to_vec() })
        }
        fn checkpoints(&self) -> &[(u32, Hash)] {
            &self.checkpoints
        }
    }

    #[test]
    fn rejects_header_whose_height_mismatches_checkpoint() {
        let chain = FakeChain { checkpoints: vec![(0, Hash::digest(b"wrong"))], accept: RefCell::new(true) };
        let mut sync = SyncState::new(Hash::ZERO);
        let accepted = sync.accept_header(&chain, b"header-bytes", 0);
        assert!(accepted.is_none());
    }

    #[test]
    fn accepts_header_matching_checkpoint_and_switches_mode() {
        let raw = b"genesis".to_vec();
        let hash = Hash::digest(&raw);
        let chain = FakeChain { checkpoints: vec![(0, hash)], accept: RefCell::new(true) };
        let mut sync = SyncState::new(Hash::ZERO);
        let accepted = sync.accept_header(&chain, &raw, 0);
        assert_eq!(accepted, Some(hash));
        assert_eq!(sync.mode(), SyncMode::GetBlocks);
    }
}
