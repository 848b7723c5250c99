//! The node binary: CLI flags, logger init, config loading, and the
//! wiring that turns `BlockStore` + `AddrBook` + `Pool` into a running
//! process (mirrors the teacher's `parity` binary crate, minus the
//! dapps/signer/RPC surfaces this spec's Non-goals exclude).

mod config;
mod node;
mod stub;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "hsknoded", version, about = "Handshake-style P2P node core")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "hsknoded.toml")]
    config: PathBuf,

    /// Override the network section's `listen` address.
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,

    /// Skip config-file loading and run with defaults (used by smoke tests).
    #[arg(long, default_value_t = false)]
    no_config_file: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse();

    let mut config = if cli.no_config_file {
        config::Config::default()
    } else if cli.config.exists() {
        config::Config::load(&cli.config)?
    } else {
        info!("no config file at {}, running with defaults", cli.config.display());
        config::Config::default()
    };

    if let Some(listen) = cli.listen {
        let net = config.network.get_or_insert_with(config::NetworkConfig::default);
        net.listen = Some(listen);
    }

    let pool_options = config.pool_options();
    let store_options = config.store_options();
    let addrbook_options = config.addrbook_options();

    std::fs::create_dir_all(&store_options.dir)?;
    let store_dir = store_options.dir.clone();

    let hasher: Arc<dyn hsk_store::HeaderHasher> = Arc::new(hsk_store::Sha256HeaderHasher);
    let store = hsk_store::BlockStore::open(store_options, hasher)?;
    info!(target: "store", "block store opened at {}", store_dir.display());
    // The store is handed off to a real `Chain` implementation in a full
    // deployment; this binary keeps it open only to prove the on-disk
    // layout round-trips, and lets `StubChain` stand in for consensus.
    drop(store);

    let now_unix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let book = hsk_addrbook::AddrBook::load(addrbook_options.clone(), now_unix)
        .unwrap_or_else(|_| hsk_addrbook::AddrBook::new(addrbook_options));

    let genesis = hsk_core::Hash::ZERO;
    let chain = Arc::new(stub::StubChain::new(genesis));
    let mempool = Arc::new(stub::StubMempool::new());
    let verifier = Arc::new(stub::NullProofVerifier);

    let seed_addrs: Vec<hsk_core::NetAddress> = config
        .seed_nodes()
        .iter()
        .filter_map(|s| node::parse_seed(s, pool_options.default_port))
        .chain(hsk_addrbook::builtin_seed_addresses(pool_options.default_port).into_iter())
        .collect();

    let listen_addr = pool_options.listen_addr;
    let node = node::Node::new(pool_options, book, chain, mempool, verifier, genesis);
    info!("starting hsknoded on network {}", config.network_name());
    node.run(listen_addr, seed_addrs).await
}
