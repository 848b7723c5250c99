//! The bucketed fresh/tried address table (spec §4.5). Single-threaded by
//! design (spec §5 "AddrBook ... all mutations via the pool event loop");
//! callers serialize access the same way the pool serializes its own
//! handlers.

use crate::entry::HostEntry;
use crate::error::Result;
use crate::group::group_key;
use crate::options::HostListOptions;
use crate::persist;
use crate::score::{LocalAddressSet, ScoreSource};
use hsk_core::constants::{BUCKET_SIZE, FRESH_BUCKET_COUNT, TRIED_BUCKET_COUNT};
use hsk_core::NetAddress;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn h(secret: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    for p in parts {
        hasher.update(p);
    }
    hasher.finalize().into()
}

fn u32_from(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// `H(secret ∥ group_key(addr) ∥ group_key(src))[:4] mod 64`, then the
/// full hash with that intermediate mod'd by the fresh-bucket count
/// (spec §4.5 "Bucket keys").
fn fresh_bucket_index(secret: &[u8; 32], addr: &NetAddress, src: &NetAddress) -> usize {
    let g_addr = group_key(addr);
    let g_src = group_key(src);
    let step1 = h(secret, &[&g_addr, &g_src]);
    let slot = (u32_from(&step1[0..4]) as usize) % 64;
    let step2 = h(secret, &[&g_addr, &(slot as u32).to_le_bytes()]);
    (u32_from(&step2[0..4]) as usize) % FRESH_BUCKET_COUNT
}

/// `H(secret ∥ addr.raw ∥ port ∥ addr.key)[:4] mod 8`, then the hash with
/// that mod'd by the tried-bucket count (spec §4.5 "Bucket keys").
fn tried_bucket_index(secret: &[u8; 32], addr: &NetAddress) -> usize {
    let mut key = Vec::with_capacity(16 + 2 + 33);
    key.extend_from_slice(&addr.raw_ip);
    key.extend_from_slice(&addr.port.to_le_bytes());
    key.extend_from_slice(&addr.identity_key);
    let step1 = h(secret, &[&key]);
    let slot = (u32_from(&step1[0..4]) as usize) % 8;
    let g = group_key(addr);
    let step2 = h(secret, &[&g, &(slot as u32).to_le_bytes()]);
    (u32_from(&step2[0..4]) as usize) % TRIED_BUCKET_COUNT
}

/// Outcome of [`AddrBook::add`] (spec §4.5 "Add rule").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A brand new entry, inserted into one fresh bucket.
    New,
    /// An existing fresh entry was merged and possibly given another
    /// fresh-bucket reference.
    Merged,
    /// Refused: the entry already has the maximum 8 fresh-bucket
    /// references, or is already promoted to tried.
    Refused,
}

pub struct AddrBook {
    options: HostListOptions,
    secret: [u8; 32],
    entries: HashMap<String, HostEntry>,
    fresh: Vec<Vec<String>>,
    tried: Vec<Vec<String>>,
    total_fresh: usize,
    total_tried: usize,
    banned: HashMap<String, u64>,
    needs_flush: bool,
    last_flush: u64,
    pub locals: LocalAddressSet,
    chance_fn: Box<dyn FnMut() -> f64 + Send>,
}

impl AddrBook {
    pub fn new(options: HostListOptions) -> AddrBook {
        AddrBook {
            options,
            secret: rand::random(),
            entries: HashMap::new(),
            fresh: vec![Vec::new(); FRESH_BUCKET_COUNT],
            tried: vec![Vec::new(); TRIED_BUCKET_COUNT],
            total_fresh: 0,
            total_tried: 0,
            banned: HashMap::new(),
            needs_flush: false,
            last_flush: 0,
            locals: LocalAddressSet::new(),
            chance_fn: Box::new(|| rand::random::<f64>()),
        }
    }

    /// Test/simulation hook: replace the `[0,1)` random source backing
    /// every stochastic decision (fresh-bucket promotion probability,
    /// `get_host` selection) with a deterministic one (spec §8 scenario 6
    /// "with our test RNG forced to 0").
    pub fn with_chance_fn(mut self, f: impl FnMut() -> f64 + Send + 'static) -> AddrBook {
        self.chance_fn = Box::new(f);
        self
    }

    fn next_chance(&mut self) -> f64 {
        (self.chance_fn)()
    }

    pub fn total_fresh(&self) -> usize {
        self.total_fresh
    }

    pub fn total_tried(&self) -> usize {
        self.total_tried
    }

    pub fn total_banned(&self) -> usize {
        self.banned.len()
    }

    pub fn needs_flush(&self) -> bool {
        self.needs_flush
    }

    pub fn get(&self, host: &str) -> Option<&HostEntry> {
        self.entries.get(host)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.entries.contains_key(host)
    }

    fn remove_fresh_ref(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count == 0 {
                self.entries.remove(key);
                self.total_fresh = self.total_fresh.saturating_sub(1);
            }
        }
    }

    /// Prunes stale entries out of `bucket_idx`, then evicts the oldest
    /// (by `time`) survivor to make room for a new insert (spec §4.5
    /// "Eviction").
    pub fn evict_fresh(&mut self, bucket_idx: usize, now: u64) -> Option<String> {
        let members = std::mem::take(&mut self.fresh[bucket_idx]);
        let mut survivors = Vec::with_capacity(members.len());
        let mut oldest: Option<(String, u32)> = None;
        for key in members {
            let stale = self.entries.get(&key).map(|e| e.is_stale(now)).unwrap_or(true);
            if stale {
                self.remove_fresh_ref(&key);
                continue;
            }
            let t = self.entries.get(&key).map(|e| e.addr.time).unwrap_or(0);
            if oldest.as_ref().map(|(_, ot)| t < *ot).unwrap_or(true) {
                oldest = Some((key.clone(), t));
            }
            survivors.push(key);
        }
        self.fresh[bucket_idx] = survivors;
        if let Some((key, _)) = &oldest {
            self.fresh[bucket_idx].retain(|k| k != key);
            self.remove_fresh_ref(key);
        }
        oldest.map(|(key, _)| key)
    }

    fn insert_into_fresh(&mut self, bucket_idx: usize, key: &str, now: u64) {
        if self.fresh[bucket_idx].len() >= BUCKET_SIZE {
            self.evict_fresh(bucket_idx, now);
        }
        self.fresh[bucket_idx].push(key.to_string());
    }

    /// Adds or refreshes a learned address (spec §4.5 "Add rule").
    pub fn add(&mut self, mut addr: NetAddress, src: NetAddress, now: u64) -> AddOutcome {
        if !addr.is_routable() {
            return AddOutcome::Refused;
        }
        if addr.time == 0 {
            addr.time = now as u32;
        }
        let key = addr.canonical_host();

        if let Some(existing) = self.entries.get(&key).cloned() {
            if existing.used {
                return AddOutcome::Refused;
            }
            if existing.ref_count >= self.options.max_fresh_refs {
                return AddOutcome::Refused;
            }

            let mut merged = existing;
            merged.addr.services |= addr.services;
            if addr.has_key() {
                merged.addr.identity_key = addr.identity_key;
            }
            let recently_active = now.saturating_sub(merged.last_success) < 24 * 3600;
            let interval = if recently_active { 3600 } else { 24 * 3600 };
            let penalty: i64 = if src != merged.src { 2 * 3600 } else { 0 };
            if (addr.time as i64) > (merged.addr.time as i64) + interval + penalty {
                merged.addr.time = addr.time;
            }
            self.entries.insert(key.clone(), merged.clone());

            let p = 1.0 / 2f64.powi(merged.ref_count as i32);
            if self.next_chance() < p {
                let bucket_idx = fresh_bucket_index(&self.secret, &addr, &src);
                if !self.fresh[bucket_idx].contains(&key) {
                    self.insert_into_fresh(bucket_idx, &key, now);
                    if let Some(e) = self.entries.get_mut(&key) {
                        e.ref_count += 1;
                    }
                }
            }
            self.needs_flush = true;
            AddOutcome::Merged
        } else {
            let entry = HostEntry::new(addr, src);
            self.entries.insert(key.clone(), entry);
            let bucket_idx = fresh_bucket_index(&self.secret, &addr, &src);
            self.insert_into_fresh(bucket_idx, &key, now);
            self.total_fresh += 1;
            self.needs_flush = true;
            AddOutcome::New
        }
    }

    /// Records a connection attempt (used by the pool's outbound filler
    /// and stall handling).
    pub fn mark_attempt(&mut self, host: &str, now: u64) {
        if let Some(e) = self.entries.get_mut(host) {
            e.attempts += 1;
            e.last_attempt = now;
            self.needs_flush = true;
        }
    }

    /// Promotes a fresh entry to tried after a completed handshake (spec
    /// §4.5 "Promotion"). Returns `false` if `host` is unknown or already
    /// tried.
    pub fn mark_ack(&mut self, host: &str, services: hsk_core::Services, now: u64) -> bool {
        let mut entry = match self.entries.get(host) {
            Some(e) if !e.used => e.clone(),
            _ => return false,
        };

        for bucket in self.fresh.iter_mut() {
            bucket.retain(|k| k != host);
        }
        self.total_fresh = self.total_fresh.saturating_sub(1);

        entry.addr.services |= services;
        entry.used = true;
        entry.ref_count = 0;
        entry.last_success = now;
        entry.attempts = 0;
        self.entries.insert(host.to_string(), entry.clone());

        let bucket_idx = tried_bucket_index(&self.secret, &entry.addr);
        if self.tried[bucket_idx].len() < BUCKET_SIZE {
            self.tried[bucket_idx].push(host.to_string());
            self.total_tried += 1;
        } else {
            let oldest_key = self.tried[bucket_idx]
                .iter()
                .min_by_key(|k| self.entries.get(*k).map(|e| e.addr.time).unwrap_or(0))
                .cloned();
            if let Some(oldest_key) = oldest_key {
                self.tried[bucket_idx].retain(|k| k != &oldest_key);
                self.tried[bucket_idx].push(host.to_string());
                if let Some(mut demoted) = self.entries.get(&oldest_key).cloned() {
                    demoted.used = false;
                    demoted.ref_count = 0;
                    self.entries.insert(oldest_key.clone(), demoted);
                    let demoted_addr = self.entries.get(&oldest_key).unwrap().addr;
                    let demoted_src = self.entries.get(&oldest_key).unwrap().src;
                    let demote_bucket = fresh_bucket_index(&self.secret, &demoted_addr, &demoted_src);
                    if let Some(e) = self.entries.get_mut(&oldest_key) {
                        e.ref_count = 1;
                    }
                    self.insert_into_fresh(demote_bucket, &oldest_key, now);
                    self.total_fresh += 1;
                } else {
                    self.total_tried += 1;
                }
            } else {
                self.tried[bucket_idx].push(host.to_string());
                self.total_tried += 1;
            }
        }
        self.needs_flush = true;
        true
    }

    /// Weighted random selection across fresh/tried (spec §4.5
    /// "Selection"). `factor` grows 1.2x per rejected candidate so the
    /// loop always terminates in practice even with a mostly-bad table.
    pub fn get_host(&mut self, now: u64) -> Option<NetAddress> {
        if self.total_fresh == 0 && self.total_tried == 0 {
            return None;
        }
        let mut factor = 1.0;
        for _ in 0..10_000 {
            let use_tried = if self.total_tried == 0 {
                false
            } else if self.total_fresh == 0 {
                true
            } else {
                self.next_chance() < 0.5
            };
            let (buckets, bucket_count) = if use_tried {
                (&self.tried, TRIED_BUCKET_COUNT)
            } else {
                (&self.fresh, FRESH_BUCKET_COUNT)
            };

            // Pick a random starting bucket, then scan forward for the
            // first non-empty one (our buckets are growable `Vec`s, not
            // the fixed-size slots Bitcoin Core's addrman scans within a
            // single bucket).
            let start = ((self.next_chance() * bucket_count as f64) as usize).min(bucket_count - 1);
            let mut key = None;
            for i in 0..bucket_count {
                let idx = (start + i) % bucket_count;
                let bucket = &buckets[idx];
                if !bucket.is_empty() {
                    let pos = ((self.next_chance() * bucket.len() as f64) as usize).min(bucket.len() - 1);
                    key = Some(bucket[pos].clone());
                    break;
                }
            }
            let key = match key {
                Some(k) => k,
                None => continue,
            };
            let chance = match self.entries.get(&key) {
                Some(e) => e.chance(now),
                None => continue,
            };
            if self.next_chance() < chance * factor {
                return self.entries.get(&key).map(|e| e.addr);
            }
            factor *= 1.2;
        }
        None
    }

    pub fn ban(&mut self, host: &str, now: u64) {
        self.banned.insert(host.to_string(), now + self.options.ban_time_secs);
        self.needs_flush = true;
    }

    pub fn is_banned(&mut self, host: &str, now: u64) -> bool {
        match self.banned.get(host) {
            Some(&expiry) if expiry > now => true,
            Some(_) => {
                self.banned.remove(host);
                false
            }
            None => false,
        }
    }

    pub fn add_local_address(&mut self, addr: NetAddress, source: ScoreSource, score: u32) {
        self.locals.add(addr, source, score);
    }

    pub fn get_local_address(&self, dest: Option<&NetAddress>) -> Option<NetAddress> {
        self.locals.get_local_address(dest, self.options.is_mainnet())
    }

    /// Serializes to `options.file` if the interval elapsed (or `force`)
    /// and `needs_flush` is set (spec §4.5 "Persistence").
    pub fn maybe_flush(&mut self, now: u64, force: bool) -> Result<bool> {
        if !self.needs_flush {
            return Ok(false);
        }
        if !force && now.saturating_sub(self.last_flush) < self.options.flush_interval_secs {
            return Ok(false);
        }
        self.save()?;
        self.last_flush = now;
        self.needs_flush = false;
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        let path = match &self.options.file {
            Some(p) => p,
            None => return Ok(()),
        };
        let file = persist::to_file(&self.secret, &self.options.network, self.options.network_magic, &self.entries, &self.fresh, &self.tried);
        let json = serde_json::to_vec_pretty(&file)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads from `options.file`, rebuilding `ref_count`/`used` from the
    /// bucket lists (current-format files) or by re-running `add`/
    /// `mark_ack` for each entry (older formats, spec §4.5 "Migration").
    /// Returns a fresh, empty book if no file exists yet.
    pub fn load(options: HostListOptions, now: u64) -> Result<AddrBook> {
        let path = match &options.file {
            Some(p) => p.clone(),
            None => return Ok(AddrBook::new(options)),
        };
        if !Path::new(&path).exists() {
            return Ok(AddrBook::new(options));
        }
        let data = fs::read(&path)?;
        let loaded = persist::from_bytes(&data)?;

        let mut book = AddrBook::new(options);
        book.secret = loaded.secret;

        if loaded.needs_reimport {
            log::warn!(target: "addrbook", "addrbook file predates current format, re-importing via promotion");
            for (host, entry) in loaded.entries {
                let outcome = book.add(entry.addr, entry.src, now);
                if outcome != AddOutcome::Refused && entry.last_success > 0 {
                    book.mark_ack(&host, entry.addr.services, entry.last_success);
                }
            }
            return Ok(book);
        }

        let fresh_ok = loaded.fresh.len() == FRESH_BUCKET_COUNT && loaded.fresh.iter().all(|b| b.len() <= BUCKET_SIZE);
        let used_ok = loaded.used.len() == TRIED_BUCKET_COUNT && loaded.used.iter().all(|b| b.len() <= BUCKET_SIZE);
        if !fresh_ok || !used_ok {
            log::warn!(target: "addrbook", "addrbook file has malformed bucket sizes, re-importing via promotion");
            for (host, entry) in loaded.entries {
                let outcome = book.add(entry.addr, entry.src, now);
                if outcome != AddOutcome::Refused && entry.last_success > 0 {
                    book.mark_ack(&host, entry.addr.services, entry.last_success);
                }
            }
            return Ok(book);
        }

        let mut entries = loaded.entries;
        for (idx, bucket) in loaded.fresh.iter().enumerate() {
            for host in bucket {
                if let Some(e) = entries.get_mut(host) {
                    e.ref_count += 1;
                }
                book.fresh[idx].push(host.clone());
            }
        }
        for (idx, bucket) in loaded.used.iter().enumerate() {
            for host in bucket {
                if let Some(e) = entries.get_mut(host) {
                    e.used = true;
                    e.ref_count = 0;
                }
                book.tried[idx].push(host.clone());
            }
        }
        book.total_fresh = entries.values().filter(|e| !e.used).count();
        book.total_tried = entries.values().filter(|e| e.used).count();
        book.entries = entries;
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn opts() -> HostListOptions {
        HostListOptions::new("main", 0x1234)
    }

    fn a(n: u8) -> NetAddress {
        NetAddress::new(IpAddr::V4(Ipv4Addr::new(10 + n, 0, 0, n)), 13038)
    }

    fn routable(n: u8) -> NetAddress {
        NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, n, 0, 1)), 13038)
    }

    #[test]
    fn add_new_creates_one_fresh_ref() {
        let mut book = AddrBook::new(opts());
        let outcome = book.add(routable(1), routable(2), 1000);
        assert_eq!(outcome, AddOutcome::New);
        assert_eq!(book.total_fresh(), 1);
        let host = routable(1).canonical_host();
        assert_eq!(book.get(&host).unwrap().ref_count, 1);
    }

    #[test]
    fn unroutable_addresses_are_refused() {
        let mut book = AddrBook::new(opts());
        assert_eq!(book.add(a(1), a(2), 1000), AddOutcome::Refused);
    }

    #[test]
    fn duplicate_add_from_new_source_can_bump_ref_count() {
        let mut book = AddrBook::new(opts()).with_chance_fn(|| 0.0);
        let addr = routable(5);
        book.add(addr, routable(1), 1000);
        let outcome = book.add(addr, routable(2), 1000);
        assert_eq!(outcome, AddOutcome::Merged);
        assert_eq!(book.get(&addr.canonical_host()).unwrap().ref_count, 2);
    }

    #[test]
    fn ref_count_at_max_refuses_further_merges() {
        let mut book = AddrBook::new(opts()).with_chance_fn(|| 0.0);
        let addr = routable(6);
        book.add(addr, routable(0), 1000);
        for i in 1..8 {
            book.add(addr, routable(i), 1000);
        }
        assert_eq!(book.get(&addr.canonical_host()).unwrap().ref_count, 8);
        let outcome = book.add(addr, routable(9), 1000);
        assert_eq!(outcome, AddOutcome::Refused);
    }

    #[test]
    fn mark_ack_promotes_fresh_to_tried() {
        let mut book = AddrBook::new(opts());
        let addr = routable(7);
        book.add(addr, routable(1), 1000);
        let host = addr.canonical_host();
        assert!(book.mark_ack(&host, hsk_core::Services::NETWORK, 1000));
        assert_eq!(book.total_fresh(), 0);
        assert_eq!(book.total_tried(), 1);
        assert!(book.get(&host).unwrap().used);
        assert_eq!(book.get(&host).unwrap().ref_count, 0);
    }

    #[test]
    fn ban_then_expiry_clears() {
        let mut book = AddrBook::new(opts());
        book.ban("1.2.3.4:13038", 1000);
        assert!(book.is_banned("1.2.3.4:13038", 2000));
        assert!(!book.is_banned("1.2.3.4:13038", 1000 + hsk_core::constants::DEFAULT_BAN_TIME_SECS + 1));
    }

    #[test]
    fn save_then_load_round_trips_totals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addrbook.json");
        let mut opts = opts();
        opts.file = Some(path.clone());
        let mut book = AddrBook::new(opts.clone());
        let addr = routable(8);
        book.add(addr, routable(1), 1000);
        book.mark_ack(&addr.canonical_host(), hsk_core::Services::NETWORK, 1000);
        book.add(routable(9), routable(2), 1000);
        book.save().unwrap();

        let reloaded = AddrBook::load(opts, 1000).unwrap();
        assert_eq!(reloaded.total_tried(), 1);
        assert_eq!(reloaded.total_fresh(), 1);
    }

    #[test]
    fn get_host_returns_none_when_empty() {
        let mut book = AddrBook::new(opts());
        assert!(book.get_host(1000).is_none());
    }

    #[test]
    fn get_host_returns_the_only_entry_with_forced_acceptance() {
        let mut book = AddrBook::new(opts()).with_chance_fn(|| 0.0);
        let addr = routable(3);
        book.add(addr, routable(1), 1000);
        let got = book.get_host(1000).unwrap();
        assert_eq!(got.canonical_host(), addr.canonical_host());
    }
}
