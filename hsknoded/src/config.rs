//! On-disk node configuration (design note §9 "dynamic config object"):
//! one explicit, serde-derived struct per `toml` file, converted into the
//! enumerated option structs each subsystem crate already exposes
//! (`PoolOptions`, `HostListOptions`, `StoreOptions`). Unknown keys are a
//! hard error, mirroring the teacher's config loader philosophy even
//! though the teacher itself used `docopt` rather than `toml` + `serde`.

use std::net::SocketAddr;
use std::path::PathBuf;

use hsk_addrbook::HostListOptions;
use hsk_core::constants::{MAGIC_MAINNET, MAGIC_REGTEST, MAGIC_TESTNET};
use hsk_core::Services;
use hsk_pool::PoolOptions;
use hsk_store::StoreOptions;
use serde::Deserialize;

fn default_network() -> String {
    "main".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./hsknode-data")
}

fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> NetworkConfig {
        NetworkConfig {
            network: default_network(),
            listen: None,
            max_outbound: None,
            max_inbound: None,
            enable_onion: false,
            brontide_only: false,
            enable_upnp: false,
            enable_checkpoints: true,
            seed_nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_network")]
    pub network: String,
    pub listen: Option<SocketAddr>,
    #[serde(default)]
    pub max_outbound: Option<usize>,
    #[serde(default)]
    pub max_inbound: Option<usize>,
    #[serde(default)]
    pub enable_onion: bool,
    #[serde(default)]
    pub brontide_only: bool,
    #[serde(default)]
    pub enable_upnp: bool,
    #[serde(default = "default_true")]
    pub enable_checkpoints: bool,
    #[serde(default)]
    pub seed_nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub max_file_length: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddrBookConfig {
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub ban_time_secs: Option<u64>,
    #[serde(default)]
    pub flush_interval_secs: Option<u64>,
}

/// The whole `hsknoded.toml`. Every section is optional and defaults to
/// an empty table; unknown *keys within a present section* are rejected.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub network: Option<NetworkConfig>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub addrbook: Option<AddrBookConfig>,
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn network_name(&self) -> String {
        self.network.as_ref().map(|n| n.network.clone()).unwrap_or_else(default_network)
    }

    pub fn magic(&self) -> u32 {
        match self.network_name().as_str() {
            "testnet" => MAGIC_TESTNET,
            "regtest" => MAGIC_REGTEST,
            _ => MAGIC_MAINNET,
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        let mut opts = PoolOptions::default();
        opts.network_magic = self.magic();
        if let Some(net) = &self.network {
            opts.listen_addr = net.listen;
            if let Some(max_outbound) = net.max_outbound {
                opts.max_outbound = max_outbound;
            }
            if let Some(max_inbound) = net.max_inbound {
                opts.max_inbound = max_inbound;
            }
            opts.enable_onion = net.enable_onion;
            opts.brontide_only = net.brontide_only;
            opts.enable_upnp = net.enable_upnp;
            opts.enable_checkpoints = net.enable_checkpoints;
        }
        opts
    }

    pub fn store_options(&self) -> StoreOptions {
        let mut opts = match &self.store {
            Some(store) => StoreOptions::new(store.dir.clone()),
            None => StoreOptions::new(default_data_dir().join("blocks")),
        };
        if let Some(store) = &self.store {
            if let Some(max_file_length) = store.max_file_length {
                opts.max_file_length = max_file_length;
            }
        }
        opts
    }

    pub fn addrbook_options(&self) -> HostListOptions {
        let network = self.network_name();
        let mut opts = HostListOptions::new(network, self.magic());
        opts.required_services = Services::NETWORK;
        if let Some(net) = &self.network {
            opts.onion_enabled = net.enable_onion;
            opts.brontide_only = net.brontide_only;
        }
        if let Some(book) = &self.addrbook {
            if let Some(file) = &book.file {
                opts = opts.with_file(file.clone());
            }
            if let Some(ban_time_secs) = book.ban_time_secs {
                opts.ban_time_secs = ban_time_secs;
            }
            if let Some(flush_interval_secs) = book.flush_interval_secs {
                opts.flush_interval_secs = flush_interval_secs;
            }
        } else {
            opts = opts.with_file(default_data_dir().join("addrbook.json"));
        }
        opts
    }

    pub fn seed_nodes(&self) -> Vec<String> {
        self.network.as_ref().map(|n| n.seed_nodes.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.network_name(), "main");
        assert_eq!(config.magic(), MAGIC_MAINNET);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let err = toml::from_str::<Config>("bogus = true").unwrap_err();
        assert!(err.to_string().contains("bogus") || err.to_string().contains("unknown"));
    }

    #[test]
    fn unknown_key_within_network_section_is_rejected() {
        let toml = "[network]\nnetwork = \"testnet\"\nbogus_flag = true\n";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn network_section_overrides_pool_options() {
        let toml = "[network]\nnetwork = \"testnet\"\nmax_outbound = 3\nenable_onion = true\n";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.magic(), MAGIC_TESTNET);
        let opts = config.pool_options();
        assert_eq!(opts.max_outbound, 3);
        assert!(opts.enable_onion);
    }

    #[test]
    fn store_section_defaults_dir_under_data_dir() {
        let config = Config::default();
        let opts = config.store_options();
        assert_eq!(opts.dir, default_data_dir().join("blocks"));
    }
}
