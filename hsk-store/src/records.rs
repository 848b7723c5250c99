use byteorder::{ByteOrder, LittleEndian};

/// Maps a hash to an on-disk slice: `file[position, position+length)` holds
/// the object payload within file `file_number` (spec §3/§4.1).
///
/// Invariant: `position + length <= file_record.used` for the owning file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRecord {
    pub file_number: u32,
    pub position: u32,
    pub length: u32,
}

impl BlockRecord {
    pub const ENCODED_LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        LittleEndian::write_u32(&mut out[0..4], self.file_number);
        LittleEndian::write_u32(&mut out[4..8], self.position);
        LittleEndian::write_u32(&mut out[8..12], self.length);
        out
    }

    pub fn decode(buf: &[u8]) -> Option<BlockRecord> {
        if buf.len() < Self::ENCODED_LEN {
            return None;
        }
        Some(BlockRecord {
            file_number: LittleEndian::read_u32(&buf[0..4]),
            position: LittleEndian::read_u32(&buf[4..8]),
            length: LittleEndian::read_u32(&buf[8..12]),
        })
    }
}

/// Per-file bookkeeping: how many live blocks the file holds and how many
/// bytes of it are in use (spec §3/§4.1).
///
/// Invariant: `used <= length`; the file is deleted once `blocks == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileRecord {
    pub blocks: u32,
    pub used: u32,
    pub length: u32,
}

impl FileRecord {
    pub const ENCODED_LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        LittleEndian::write_u32(&mut out[0..4], self.blocks);
        LittleEndian::write_u32(&mut out[4..8], self.used);
        LittleEndian::write_u32(&mut out[8..12], self.length);
        out
    }

    pub fn decode(buf: &[u8]) -> Option<FileRecord> {
        if buf.len() < Self::ENCODED_LEN {
            return None;
        }
        Some(FileRecord {
            blocks: LittleEndian::read_u32(&buf[0..4]),
            used: LittleEndian::read_u32(&buf[4..8]),
            length: LittleEndian::read_u32(&buf[8..12]),
        })
    }

    /// Writes the three LE u32 fields to `out` and returns it, resolving the
    /// design-note §9 open question (the source's sibling `write(bw)` for
    /// `BlockRecord` returns the writer; this crate's `FileRecord` follows
    /// the same contract so both types are symmetric).
    pub fn write(&self, mut out: Vec<u8>) -> Vec<u8> {
        out.extend_from_slice(&self.encode());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_record_round_trips() {
        let r = BlockRecord { file_number: 7, position: 1000, length: 4096 };
        let enc = r.encode();
        assert_eq!(BlockRecord::decode(&enc), Some(r));
    }

    #[test]
    fn file_record_round_trips_and_write_returns_writer() {
        let r = FileRecord { blocks: 2, used: 4104, length: 128 * 1024 * 1024 };
        let buf = r.write(Vec::new());
        assert_eq!(buf.len(), FileRecord::ENCODED_LEN);
        assert_eq!(FileRecord::decode(&buf), Some(r));
    }
}
