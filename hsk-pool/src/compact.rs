//! Compact-block reconstruction (spec §4.5): a peer announces a block by
//! header plus a short-id per transaction, keyed by a per-block SipHash
//! so ids can't be precomputed offline. Reassembly fills each short-id
//! from the local mempool and falls back to `getblocktxn` for misses.

use hsk_core::Hash;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::Hasher;

/// Derives the two SipHash-1-3 keys for one compact block from its
/// header hash and a locally-chosen nonce, per the short-id scheme.
pub fn derive_siphash_keys(header_hash: &Hash, nonce: u64) -> (u64, u64) {
    let mut pre = Vec::with_capacity(40);
    pre.extend_from_slice(header_hash.as_bytes());
    pre.extend_from_slice(&nonce.to_le_bytes());
    let digest = Hash::digest(&pre);
    let bytes = digest.as_bytes();
    let k0 = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let k1 = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    (k0, k1)
}

/// Six bytes of SipHash-1-3(tx hash), the wire-format short id.
pub fn short_id(keys: (u64, u64), tx_hash: &Hash) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(keys.0, keys.1);
    hasher.write(tx_hash.as_bytes());
    hasher.finish() & 0x0000_ffff_ffff_ffff
}

#[derive(Debug, Clone)]
pub struct PrefilledTx {
    pub index: u32,
    pub raw: Vec<u8>,
}

/// One compact block under reconstruction. Owned by the `PeerHandle`
/// that announced it (spec §4.5 "a peer's compact block is private to
/// that peer's session until it resolves").
pub struct Reassembler {
    pub header: Vec<u8>,
    pub tx_count: usize,
    keys: (u64, u64),
    short_ids: Vec<u64>,
    prefilled: HashMap<u32, Vec<u8>>,
    filled: HashMap<u32, Vec<u8>>,
}

impl Reassembler {
    pub fn new(header: Vec<u8>, header_hash: Hash, nonce: u64, short_ids: Vec<u64>, prefilled: Vec<PrefilledTx>) -> Reassembler {
        let keys = derive_siphash_keys(&header_hash, nonce);
        let tx_count = short_ids.len() + prefilled.len();
        let prefilled = prefilled.into_iter().map(|p| (p.index, p.raw)).collect();
        Reassembler { header, tx_count, keys, short_ids, prefilled, filled: HashMap::new() }
    }

    /// Attempts to fill every non-prefilled slot from mempool transactions
    /// already on hand, matching by short id. Returns the slots still
    /// missing after the pass, in block order.
    pub fn fill_from_mempool<'a>(&mut self, candidates: impl Iterator<Item = (&'a Hash, &'a [u8])>) -> Vec<u32> {
        let mut by_short: HashMap<u64, &Hash> = HashMap::new();
        let cands: Vec<_> = candidates.collect();
        for (hash, _) in &cands {
            by_short.insert(short_id(self.keys, hash), hash);
        }
        let mut slot = 0u32;
        let mut short_idx = 0usize;
        let mut matched: HashMap<Hash, Vec<u8>> = HashMap::new();
        for (hash, raw) in &cands {
            matched.insert(**hash, raw.to_vec());
        }
        while (slot as usize) < self.tx_count {
            if self.prefilled.contains_key(&slot) {
                slot += 1;
                continue;
            }
            if short_idx < self.short_ids.len() {
                let want = self.short_ids[short_idx];
                short_idx += 1;
                if let Some(hash) = by_short.get(&want) {
                    if let Some(raw) = matched.get(*hash) {
                        self.filled.insert(slot, raw.clone());
                    }
                }
            }
            slot += 1;
        }
        self.missing_slots()
    }

    /// Fills slots from a peer's `blocktxn` response to our `getblocktxn`.
    pub fn fill_missing(&mut self, slot: u32, raw: Vec<u8>) {
        self.filled.insert(slot, raw);
    }

    pub fn missing_slots(&self) -> Vec<u32> {
        (0..self.tx_count as u32)
            .filter(|slot| !self.prefilled.contains_key(slot) && !self.filled.contains_key(slot))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_slots().is_empty()
    }

    /// Assembles the full block body once every slot is filled. Returns
    /// `None` if called early; callers should check `is_complete` first.
    pub fn to_block(&self) -> Option<Vec<u8>> {
        if !self.is_complete() {
            return None;
        }
        let mut out = self.header.clone();
        out.extend_from_slice(&(self.tx_count as u32).to_le_bytes());
        for slot in 0..self.tx_count as u32 {
            let raw = self.prefilled.get(&slot).or_else(|| self.filled.get(&slot))?;
            out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
            out.extend_from_slice(raw);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_hash(b: u8) -> Hash {
        Hash::digest(&[b])
    }

    #[test]
    fn short_id_is_stable_for_same_keys_and_tx() {
        let keys = (1, 2);
        let h = tx_hash(9);
        assert_eq!(short_id(keys, &h), short_id(keys, &h));
    }

    #[test]
    fn different_nonces_give_different_keys() {
        let header_hash = Hash::digest(b"header");
        let (a0, a1) = derive_siphash_keys(&header_hash, 1);
        let (b0, b1) = derive_siphash_keys(&header_hash, 2);
        assert!(a0 != b0 || a1 != b1);
    }

    #[test]
    fn fills_and_completes_from_mempool_matches() {
        let header_hash = Hash::digest(b"h");
        let nonce = 42;
        let keys = derive_siphash_keys(&header_hash, nonce);
        let tx_a = tx_hash(1);
        let tx_b = tx_hash(2);
        let short_ids = vec![short_id(keys, &tx_a), short_id(keys, &tx_b)];
        let mut reasm = Reassembler::new(vec![0u8; 80], header_hash, nonce, short_ids, vec![]);
        assert!(!reasm.is_complete());

        let raw_a = b"tx-a-body".to_vec();
        let raw_b = b"tx-b-body".to_vec();
        let candidates = vec![(&tx_a, raw_a.as_slice()), (&tx_b, raw_b.as_slice())];
        let missing = reasm.fill_from_mempool(candidates.into_iter());
        assert!(missing.is_empty());
        assert!(reasm.is_complete());
        let block = reasm.to_block().unwrap();
        assert!(block.len() > 80);
    }

    #[test]
    fn missing_slot_is_filled_by_getblocktxn_response() {
        let header_hash = Hash::digest(b"h2");
        let nonce = 7;
        let keys = derive_siphash_keys(&header_hash, nonce);
        let tx_a = tx_hash(5);
        let short_ids = vec![short_id(keys, &tx_a)];
        let mut reasm = Reassembler::new(vec![0u8; 80], header_hash, nonce, short_ids, vec![]);
        let missing = reasm.fill_from_mempool(std::iter::empty());
        assert_eq!(missing, vec![0]);
        reasm.fill_missing(0, b"late-tx".to_vec());
        assert!(reasm.is_complete());
    }
}
