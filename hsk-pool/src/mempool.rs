//! The transaction-pool collaborator (spec §1 "Out of scope"), consumed
//! only at its interface.

use hsk_core::Hash;

#[derive(Debug, Clone)]
pub enum MempoolEvent {
    Tx(Hash),
    Claim(Hash),
    Airdrop(Hash),
    BadOrphan(Hash),
}

/// The interface `Pool` drives transaction-pool interactions through.
/// Out of scope: transaction validation rules (spec §1 Non-goals).
pub trait Mempool: Send + Sync {
    fn add_tx(&self, raw: &[u8]) -> bool;
    fn add_claim(&self, raw: &[u8]) -> bool;
    fn add_airdrop(&self, raw: &[u8]) -> bool;
    fn get_tx(&self, hash: &Hash) -> Option<Vec<u8>>;
    fn get_claim(&self, hash: &Hash) -> Option<Vec<u8>>;
    fn get_airdrop(&self, hash: &Hash) -> Option<Vec<u8>>;
    fn has(&self, hash: &Hash) -> bool;
    fn has_reject(&self, hash: &Hash) -> bool;

    /// Every transaction currently held, for compact-block short-id
    /// matching (spec §4.5 "fillMempool"). Snapshotting avoids holding a
    /// mempool lock across the whole reassembly pass.
    fn snapshot(&self) -> Vec<(Hash, Vec<u8>)>;
}
