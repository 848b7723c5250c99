//! JSON persistence for the AddrBook (spec §4.5 "Persistence", §6
//! "AddrBook JSON file").

use crate::entry::HostEntry;
use crate::error::{AddrBookError, Result};
use hsk_core::constants::ADDRBOOK_FORMAT_VERSION;
use hsk_core::{parse_canonical_host, Services};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize)]
pub(crate) struct AddrBookFile {
    pub version: u32,
    pub network: String,
    pub magic: u32,
    pub key: String,
    pub addrs: Vec<AddrRecord>,
    pub fresh: Vec<Vec<String>>,
    pub used: Vec<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct AddrRecord {
    pub addr: String,
    pub src: String,
    pub services: u32,
    pub time: u32,
    pub attempts: u32,
    #[serde(rename = "lastSuccess")]
    pub last_success: u64,
    #[serde(rename = "lastAttempt")]
    pub last_attempt: u64,
}

pub(crate) fn to_file(
    secret: &[u8; 32],
    network: &str,
    magic: u32,
    entries: &HashMap<String, HostEntry>,
    fresh: &[Vec<String>],
    used: &[Vec<String>],
) -> AddrBookFile {
    let addrs = entries
        .iter()
        .map(|(host, e)| AddrRecord {
            addr: host.clone(),
            src: e.src.canonical_host(),
            services: e.addr.services.bits(),
            time: e.addr.time,
            attempts: e.attempts,
            last_success: e.last_success,
            last_attempt: e.last_attempt,
        })
        .collect();
    AddrBookFile {
        version: ADDRBOOK_FORMAT_VERSION,
        network: network.to_string(),
        magic,
        key: hex::encode(secret),
        addrs,
        fresh: fresh.to_vec(),
        used: used.to_vec(),
    }
}

/// The result of loading a file: the reconstructed entries keyed by
/// canonical hostname, the bucket membership to trust verbatim (current
/// format) or rebuild via re-promotion (older formats), and the secret.
pub(crate) struct Loaded {
    pub secret: [u8; 32],
    pub entries: HashMap<String, HostEntry>,
    pub fresh: Vec<Vec<String>>,
    pub used: Vec<Vec<String>>,
    /// `true` if the file predates the current format and bucket
    /// membership must be rebuilt by re-running add/promote rather than
    /// trusted directly (spec §4.5 "Migration").
    pub needs_reimport: bool,
}

pub(crate) fn from_bytes(data: &[u8]) -> Result<Loaded> {
    let file: AddrBookFile = serde_json::from_slice(data)?;
    let secret_bytes = hex::decode(&file.key).map_err(|e| AddrBookError::Malformed(e.to_string()))?;
    if secret_bytes.len() != 32 {
        return Err(AddrBookError::Malformed("bucket secret must be 32 bytes".into()));
    }
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&secret_bytes);

    let mut entries = HashMap::new();
    for rec in &file.addrs {
        let mut addr = parse_canonical_host(&rec.addr)
            .ok_or_else(|| AddrBookError::Malformed(format!("bad address hostname {}", rec.addr)))?;
        addr.services = Services::from_bits_truncate(rec.services);
        addr.time = rec.time;
        let src = parse_canonical_host(&rec.src)
            .ok_or_else(|| AddrBookError::Malformed(format!("bad source hostname {}", rec.src)))?;
        let entry = HostEntry {
            addr,
            src,
            ref_count: 0,
            used: false,
            attempts: rec.attempts,
            last_attempt: rec.last_attempt,
            last_success: rec.last_success,
        };
        entries.insert(rec.addr.clone(), entry);
    }

    let needs_reimport = file.version < ADDRBOOK_FORMAT_VERSION;
    Ok(Loaded { secret, entries, fresh: file.fresh, used: file.used, needs_reimport })
}
