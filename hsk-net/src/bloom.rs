//! Rolling inventory/address filters (spec §4.4): fixed-capacity Bloom
//! filters that periodically reset so a long-lived session doesn't grow an
//! unbounded false-positive rate. There is no crate on crates.io with this
//! exact "two generations, swap and clear the older one" rolling shape, so
//! it's hand-rolled the way the teacher hand-rolls its own packet-id
//! dedup table in `util/network`.

use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// A classic Bloom filter sized from a target capacity and false-positive
/// rate, using two independent SipHash-1-3 keys combined à la Kirsch-
/// Mitzenmacher to derive as many hash functions as needed.
struct FixedBloom {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
    key0: u64,
    key1: u64,
}

impl FixedBloom {
    fn new(capacity: usize, fpr: f64, key0: u64, key1: u64) -> FixedBloom {
        let capacity = capacity.max(1);
        let num_bits = optimal_num_bits(capacity, fpr);
        let num_hashes = optimal_num_hashes(capacity, num_bits);
        let words = (num_bits + 63) / 64;
        FixedBloom { bits: vec![0u64; words.max(1)], num_bits, num_hashes, key0, key1 }
    }

    fn hashes(&self, data: &[u8]) -> impl Iterator<Item = usize> + '_ {
        let mut h1 = SipHasher13::new_with_keys(self.key0, self.key1);
        h1.write(data);
        let a = h1.finish();
        let mut h2 = SipHasher13::new_with_keys(self.key1, self.key0);
        h2.write(data);
        let b = h2.finish();
        (0..self.num_hashes).map(move |i| {
            let combined = a.wrapping_add((i as u64).wrapping_mul(b));
            (combined as usize) % self.num_bits
        })
    }

    fn insert(&mut self, data: &[u8]) {
        for bit in self.hashes(data).collect::<Vec<_>>() {
            self.bits[bit / 64] |= 1 << (bit % 64);
        }
    }

    fn contains(&self, data: &[u8]) -> bool {
        self.hashes(data).all(|bit| self.bits[bit / 64] & (1 << (bit % 64)) != 0)
    }

    fn clear(&mut self) {
        for word in &mut self.bits {
            *word = 0;
        }
    }
}

fn optimal_num_bits(capacity: usize, fpr: f64) -> usize {
    let n = capacity as f64;
    let m = -(n * fpr.ln()) / (std::f64::consts::LN_2 * std::f64::consts::LN_2);
    (m.ceil() as usize).max(64)
}

fn optimal_num_hashes(capacity: usize, num_bits: usize) -> u32 {
    let k = (num_bits as f64 / capacity as f64) * std::f64::consts::LN_2;
    (k.round() as u32).clamp(1, 24)
}

/// A two-generation rolling filter: inserts land in `current`; membership
/// checks consult both generations. Once `current` reaches `rollover_at`
/// insertions, it becomes `previous` and a fresh, empty filter takes its
/// place — bounding the false-positive rate indefinitely without ever
/// fully forgetting very recent entries.
pub struct RollingFilter {
    current: FixedBloom,
    previous: FixedBloom,
    inserted: usize,
    rollover_at: usize,
    capacity: usize,
    fpr: f64,
    generation: u64,
}

impl RollingFilter {
    pub fn new(capacity: usize, fpr: f64) -> RollingFilter {
        let generation = 0;
        let (k0, k1) = keys_for_generation(generation);
        let current = FixedBloom::new(capacity, fpr, k0, k1);
        let previous = FixedBloom::new(capacity, fpr, k0, k1);
        RollingFilter {
            current,
            previous,
            inserted: 0,
            rollover_at: capacity.max(1),
            capacity,
            fpr,
            generation,
        }
    }

    pub fn insert(&mut self, data: &[u8]) {
        if self.current.contains(data) {
            return;
        }
        self.current.insert(data);
        self.inserted += 1;
        if self.inserted >= self.rollover_at {
            self.roll();
        }
    }

    /// Inserts `data` and reports whether it was already present (in
    /// either generation) before the insert — the dedup check peers use
    /// before relaying an inventory item.
    pub fn insert_and_check(&mut self, data: &[u8]) -> bool {
        let already = self.contains(data);
        self.insert(data);
        already
    }

    pub fn contains(&self, data: &[u8]) -> bool {
        self.current.contains(data) || self.previous.contains(data)
    }

    fn roll(&mut self) {
        self.generation += 1;
        let (k0, k1) = keys_for_generation(self.generation);
        let mut next = FixedBloom::new(self.capacity, self.fpr, k0, k1);
        std::mem::swap(&mut next, &mut self.current);
        self.previous = next;
        self.inserted = 0;
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
        self.inserted = 0;
    }
}

fn keys_for_generation(generation: u64) -> (u64, u64) {
    (0x7465_736b_6861_7368 ^ generation, 0x686e_736e_6f69_7365 ^ generation.rotate_left(17))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_membership_after_insert() {
        let mut filter = RollingFilter::new(100, 1e-4);
        assert!(!filter.contains(b"item-a"));
        filter.insert(b"item-a");
        assert!(filter.contains(b"item-a"));
        assert!(!filter.contains(b"item-b"));
    }

    #[test]
    fn insert_and_check_reports_prior_membership() {
        let mut filter = RollingFilter::new(100, 1e-4);
        assert!(!filter.insert_and_check(b"x"));
        assert!(filter.insert_and_check(b"x"));
    }

    #[test]
    fn rolling_over_does_not_forget_the_newest_insert() {
        let mut filter = RollingFilter::new(8, 1e-3);
        for i in 0..32 {
            filter.insert(format!("filler-{i}").as_bytes());
        }
        filter.insert(b"latest");
        assert!(filter.contains(b"latest"));
    }

    #[test]
    fn clear_empties_both_generations() {
        let mut filter = RollingFilter::new(50, 1e-4);
        filter.insert(b"gone-after-clear");
        filter.clear();
        assert!(!filter.contains(b"gone-after-clear"));
    }
}
