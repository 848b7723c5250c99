use byteorder::{ByteOrder, LittleEndian};
use hsk_core::BlockType;
use std::path::{Path, PathBuf};

/// Magic stamped at the start of every object header (distinct from the
/// network wire magic in `hsk-core::constants`; this one only has to be
/// internally consistent).
pub const OBJECT_MAGIC: u32 = 0xb10c_f11e;

/// `magic(4) + length(4)`, the header every object carries.
pub const OBJECT_HEADER_SIZE: u32 = 8;
/// UNDO objects additionally carry the 32-byte hash right after the header.
pub const UNDO_HASH_SIZE: u32 = 32;

pub fn mhdr_size(ty: BlockType) -> u32 {
    match ty {
        BlockType::Undo => OBJECT_HEADER_SIZE + UNDO_HASH_SIZE,
        BlockType::Block | BlockType::Merkle => OBJECT_HEADER_SIZE,
    }
}

/// `<prefix>NNNNN.dat`, NNNNN zero-padded to 5 decimals (spec §6; at most
/// 99,999 files per type).
pub fn file_path(dir: &Path, ty: BlockType, file_no: u32) -> PathBuf {
    dir.join(format!("{}{:05}.dat", ty.file_prefix(), file_no))
}

pub fn write_header(buf: &mut Vec<u8>, length: u32) {
    let mut hdr = [0u8; 8];
    LittleEndian::write_u32(&mut hdr[0..4], OBJECT_MAGIC);
    LittleEndian::write_u32(&mut hdr[4..8], length);
    buf.extend_from_slice(&hdr);
}

pub fn read_u32_le(buf: &[u8]) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    Some(LittleEndian::read_u32(&buf[0..4]))
}
