use hsk_core::constants::{DEFAULT_MAX_OUTBOUND, DISCOVERY_INTERVAL_SECS, OUTBOUND_FILL_INTERVAL_SECS};
use hsk_core::Services;

/// Explicit, enumerated pool configuration (design note §9 "dynamic
/// config object"). The binary crate loads this from TOML with
/// `deny_unknown_fields`; this struct is just the validated result.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_outbound: usize,
    pub max_inbound: usize,
    pub outbound_fill_interval_secs: u64,
    pub discovery_interval_secs: u64,
    pub listen_addr: Option<std::net::SocketAddr>,
    pub required_services: Services,
    pub enable_onion: bool,
    pub brontide_only: bool,
    pub enable_upnp: bool,
    pub enable_checkpoints: bool,
    pub network_magic: u32,
    pub default_port: u16,
    pub our_nonce: u64,
    pub user_agent: String,
    pub max_proof_rps: u32,
}

impl Default for PoolOptions {
    fn default() -> PoolOptions {
        PoolOptions {
            max_outbound: DEFAULT_MAX_OUTBOUND,
            max_inbound: 117,
            outbound_fill_interval_secs: OUTBOUND_FILL_INTERVAL_SECS,
            discovery_interval_secs: DISCOVERY_INTERVAL_SECS,
            listen_addr: None,
            required_services: Services::NETWORK,
            enable_onion: false,
            brontide_only: false,
            enable_upnp: false,
            enable_checkpoints: true,
            network_magic: hsk_core::constants::MAGIC_MAINNET,
            default_port: 13038,
            our_nonce: rand::random(),
            user_agent: "/hsknode:0.1.0/".to_string(),
            max_proof_rps: 20,
        }
    }
}
