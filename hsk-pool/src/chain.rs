//! The consensus-validation collaborator (spec §1 "Out of scope"):
//! consumed only at its interface. Represented as a trait object per
//! design note §9 rather than a concrete dependency, so the pool can be
//! exercised against a fake chain in tests.

use hsk_core::Hash;

/// One linked header, as accepted into the chain or the pool's own
/// pre-commit header list during checkpoint sync (spec §4.6).
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub hash: Hash,
    pub prev_block: Hash,
    pub height: u32,
    /// Raw 80-byte header bytes, kept opaque: PoW/consensus verification
    /// is delegated to `Chain::verify_header`.
    pub raw: Vec<u8>,
}

/// Events the chain emits (spec §1): `connect` on a new best-chain tip,
/// `reset` on a reorg back to some ancestor, `full` once initial sync
/// completes, `bad orphan` on an orphan that will never connect.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Connect(ChainEntry),
    Reset(Hash),
    Full,
    BadOrphan(Hash),
}

/// The interface `Pool` drives consensus validation through. Out of
/// scope: the rules behind `add`/`verify_header` themselves (spec §1
/// Non-goals "Consensus rules").
pub trait Chain: Send + Sync {
    /// Submits a fully assembled block (raw bytes, opaque to the pool).
    /// Returns `true` if accepted onto some chain (main or side), `false`
    /// if it's an orphan the chain is buffering.
    fn add_block(&self, raw: &[u8]) -> bool;

    fn has(&self, hash: &Hash) -> bool;

    fn is_orphan(&self, hash: &Hash) -> bool;

    /// A block-locator summarizing our view of the chain, newest-first
    /// with exponentially sparser steps further back (spec §4.6
    /// "getblocks mode").
    fn get_locator(&self, from: Option<Hash>) -> Vec<Hash>;

    fn get_entry(&self, hash: &Hash) -> Option<ChainEntry>;

    fn get_next_hash(&self, hash: &Hash) -> Option<Hash>;

    fn tip_height(&self) -> u32;

    fn tip_hash(&self) -> Hash;

    fn is_synced(&self) -> bool;

    /// Links and PoW/checkpoint-verifies a raw 80-byte header without
    /// committing it (spec §4.6 "headers-first ... validate header
    /// chain"). Consensus rules behind this are delegated.
    fn verify_header(&self, raw: &[u8], prev: Option<&ChainEntry>) -> Option<ChainEntry>;

    /// Checkpoints as `(height, hash)` pairs the sync strategy must
    /// treat as gospel while bulk-downloading headers (spec §4.6).
    fn checkpoints(&self) -> &[(u32, Hash)];
}
