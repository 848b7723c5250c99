use hsk_core::Hash;

/// Recovers a block hash from the first 80 bytes of a BLOCK/MERKLE payload
/// (spec §4.1). This is the chain's hashing function, consumed here as a
/// callback hook per design note §9 — the store never links against the
/// consensus crate directly.
pub trait HeaderHasher: Send + Sync {
    fn hash_header(&self, header: &[u8]) -> Hash;
}

/// Default used by tests and standalone tools: SHA-256 of the raw header
/// bytes. A real node supplies the chain's actual PoW hash function here.
pub struct Sha256HeaderHasher;

impl HeaderHasher for Sha256HeaderHasher {
    fn hash_header(&self, header: &[u8]) -> Hash {
        Hash::digest(header)
    }
}
