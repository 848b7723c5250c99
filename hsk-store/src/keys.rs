use byteorder::{BigEndian, ByteOrder};
use hsk_core::{BlockType, Hash};

/// Index key-space layout (spec §6): a one-byte prefix distinguishes
/// per-block, per-file, last-file-pointer, and schema-version records, with
/// the object type folded in right after the prefix so that a type's
/// records sort together.
const PREFIX_BLOCK: u8 = 0x00;
const PREFIX_FILE: u8 = 0x01;
const PREFIX_LAST_FILE: u8 = 0x02;
const PREFIX_VERSION: u8 = 0x03;

pub fn block_key(ty: BlockType, hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 32);
    key.push(PREFIX_BLOCK);
    key.push(ty.key_prefix());
    key.extend_from_slice(hash.as_bytes());
    key
}

pub fn file_key(ty: BlockType, file_no: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(6);
    key.push(PREFIX_FILE);
    key.push(ty.key_prefix());
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, file_no);
    key.extend_from_slice(&buf);
    key
}

pub fn file_key_prefix(ty: BlockType) -> Vec<u8> {
    vec![PREFIX_FILE, ty.key_prefix()]
}

pub fn last_file_key(ty: BlockType) -> Vec<u8> {
    vec![PREFIX_LAST_FILE, ty.key_prefix()]
}

pub fn version_key() -> Vec<u8> {
    vec![PREFIX_VERSION]
}

pub fn file_no_from_key(key: &[u8]) -> Option<u32> {
    if key.len() < 6 {
        return None;
    }
    Some(BigEndian::read_u32(&key[2..6]))
}
