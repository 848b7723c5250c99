use hsk_core::constants::{ADDRBOOK_FLUSH_INTERVAL_SECS, DEFAULT_BAN_TIME_SECS, MAX_FRESH_REFS};
use hsk_core::Services;
use std::path::PathBuf;

/// Explicit configuration for one [`crate::AddrBook`] instance (design
/// note §9's "dynamic config object" as an enumerated struct). Unknown
/// keys are rejected at load time by the binary's TOML loader, not here —
/// this struct is the validated, in-memory result of that load.
#[derive(Debug, Clone)]
pub struct HostListOptions {
    /// Network magic carried in the persisted file for sanity checking on
    /// load (spec §4.5 "Persistence").
    pub network_magic: u32,
    /// Human-readable network name (`main`/`testnet`/`regtest`), also
    /// persisted for sanity checking and used by the mainnet-only UPnP
    /// conservatism rule (spec §4.5 "Local address scoring").
    pub network: String,
    /// Where the book is serialized; `None` disables persistence
    /// entirely (used by tests).
    pub file: Option<PathBuf>,
    pub ban_time_secs: u64,
    pub flush_interval_secs: u64,
    pub max_fresh_refs: u32,
    /// Services a candidate host must advertise to be selected by
    /// `get_host`/outbound filling (spec §4.6 "required services").
    pub required_services: Services,
    /// Whether onion-mapped addresses may be selected at all.
    pub onion_enabled: bool,
    /// Whether only brontide (encrypted-transport) peers may be selected.
    pub brontide_only: bool,
}

impl HostListOptions {
    pub fn new(network: impl Into<String>, network_magic: u32) -> HostListOptions {
        HostListOptions {
            network_magic,
            network: network.into(),
            file: None,
            ban_time_secs: DEFAULT_BAN_TIME_SECS,
            flush_interval_secs: ADDRBOOK_FLUSH_INTERVAL_SECS,
            max_fresh_refs: MAX_FRESH_REFS,
            required_services: Services::NETWORK,
            onion_enabled: false,
            brontide_only: false,
        }
    }

    pub fn with_file(mut self, path: PathBuf) -> HostListOptions {
        self.file = Some(path);
        self
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == "main"
    }
}
