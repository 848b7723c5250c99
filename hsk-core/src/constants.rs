/// Process-wide wire constants (spec §4.2/§6). These, together with the
/// packet taxonomy, are the global constants design note §9 calls out:
/// they never vary per-instance.

/// Magic bytes prefixing every wire frame. Distinguishes mainnet from test
/// networks the way the teacher's `HostInfo` network id does.
pub const MAGIC_MAINNET: u32 = 0x8efa_1fbe;
pub const MAGIC_TESTNET: u32 = 0x1357_7511;
pub const MAGIC_REGTEST: u32 = 0x5072_ab58;

/// `[magic: u32][cmd: u8][payload_len: u32]`.
pub const WIRE_HEADER_SIZE: usize = 4 + 1 + 4;

/// Maximum payload size in bytes (spec §4.2/§6: 8 x 10^6).
pub const MAX_MESSAGE_SIZE: usize = 8_000_000;

/// Default maximum size of a single BlockStore data file (spec §4.1).
pub const DEFAULT_MAX_FILE_LENGTH: u32 = 128 * 1024 * 1024;

/// Noise-XK act sizes (spec §4.3/§6).
pub const NOISE_ACT_ONE_SIZE: usize = 80;
pub const NOISE_ACT_TWO_SIZE: usize = 80;
pub const NOISE_ACT_THREE_SIZE: usize = 65;
pub const NOISE_PROLOGUE: &[u8] = b"hns";
pub const NOISE_PROTOCOL_NAME: &str = "Noise_XK_secp256k1_ChaChaPoly_SHA256+SVDW_Squared";
/// Rekey after this many AEAD encryptions in one direction (spec §4.3).
pub const NOISE_REKEY_INTERVAL: u64 = 1000;

/// Peer session timers (spec §4.4).
pub const PING_INTERVAL_SECS: u64 = 30;
pub const INV_FLUSH_INTERVAL_SECS: u64 = 5;
pub const INV_FLUSH_MAX_ITEMS: usize = 1000;
pub const INV_FLUSH_EAGER_THRESHOLD: usize = 500;
pub const STALL_CHECK_INTERVAL_SECS: u64 = 5;
pub const CONNECT_TIMEOUT_SECS: u64 = 5;
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 5;
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
pub const IDLE_TIMEOUT_SECS: u64 = 20 * 60;

/// Ban scoring (spec §4.4/§7).
pub const BAN_SCORE_GENERIC: u32 = 10;
pub const BAN_SCORE_INVALID: u32 = 100;
pub const BAN_SCORE_THRESHOLD: u32 = 100;

/// Inventory filter sizing (spec §4.4).
pub const INV_FILTER_CAPACITY: usize = 50_000;
pub const INV_FILTER_FPR: f64 = 1e-6;
pub const ADDR_FILTER_CAPACITY: usize = 5_000;

/// Pool sizing (spec §4.6/§7).
pub const DEFAULT_MAX_OUTBOUND: usize = 8;
pub const OUTBOUND_FILL_INTERVAL_SECS: u64 = 3;
pub const DISCOVERY_INTERVAL_SECS: u64 = 120;
pub const MAX_INV_ITEMS: usize = 50_000;
pub const MAX_BLOCK_PENDING: usize = 50_000 + 1_000;
pub const MAX_TX_PENDING: usize = 10_000;
pub const MAX_CLAIM_PENDING: usize = 1_000;
pub const MAX_GETBLOCKS_HASHES: usize = 500;
pub const BROADCAST_TIMEOUT_SECS: u64 = 60;

/// AddrBook sizing (spec §4.5).
pub const FRESH_BUCKET_COUNT: usize = 1024;
pub const TRIED_BUCKET_COUNT: usize = 256;
pub const BUCKET_SIZE: usize = 64;
pub const MAX_FRESH_REFS: u32 = 8;
pub const DEFAULT_BAN_TIME_SECS: u64 = 24 * 3600;
pub const ADDRBOOK_FLUSH_INTERVAL_SECS: u64 = 120;
pub const ADDRBOOK_FORMAT_VERSION: u32 = 4;
