/// The wire-stable packet taxonomy (spec §4.4). Numeric tags are part of the
/// wire protocol and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Version = 0,
    Verack = 1,
    Ping = 2,
    Pong = 3,
    GetAddr = 4,
    Addr = 5,
    Inv = 6,
    GetData = 7,
    NotFound = 8,
    GetBlocks = 9,
    GetHeaders = 10,
    Headers = 11,
    SendHeaders = 12,
    Block = 13,
    Tx = 14,
    Reject = 15,
    Mempool = 16,
    FilterLoad = 17,
    FilterAdd = 18,
    FilterClear = 19,
    MerkleBlock = 20,
    FeeFilter = 21,
    SendCmpct = 22,
    CmpctBlock = 23,
    GetBlockTxn = 24,
    BlockTxn = 25,
    GetProof = 26,
    Proof = 27,
    Claim = 28,
    Airdrop = 29,
    Unknown = 30,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Option<PacketType> {
        use PacketType::*;
        Some(match v {
            0 => Version,
            1 => Verack,
            2 => Ping,
            3 => Pong,
            4 => GetAddr,
            5 => Addr,
            6 => Inv,
            7 => GetData,
            8 => NotFound,
            9 => GetBlocks,
            10 => GetHeaders,
            11 => Headers,
            12 => SendHeaders,
            13 => Block,
            14 => Tx,
            15 => Reject,
            16 => Mempool,
            17 => FilterLoad,
            18 => FilterAdd,
            19 => FilterClear,
            20 => MerkleBlock,
            21 => FeeFilter,
            22 => SendCmpct,
            23 => CmpctBlock,
            24 => GetBlockTxn,
            25 => BlockTxn,
            26 => GetProof,
            27 => Proof,
            28 => Claim,
            29 => Airdrop,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The kind of object an `inv`/`getdata` entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvType {
    Block,
    Tx,
    Claim,
    Airdrop,
    FilteredBlock,
    CompactBlock,
}

/// A single inventory vector: a typed hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvItem {
    pub kind: InvType,
    pub hash: crate::Hash,
}

/// The three independently-numbered object kinds tracked by the blockstore
/// (spec §3/§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Block,
    Undo,
    Merkle,
}

impl BlockType {
    pub fn file_prefix(self) -> &'static str {
        match self {
            BlockType::Block => "blk",
            BlockType::Undo => "blu",
            BlockType::Merkle => "blm",
        }
    }

    pub fn key_prefix(self) -> u8 {
        match self {
            BlockType::Block => 0,
            BlockType::Undo => 1,
            BlockType::Merkle => 2,
        }
    }

    pub const ALL: [BlockType; 3] = [BlockType::Block, BlockType::Undo, BlockType::Merkle];
}
