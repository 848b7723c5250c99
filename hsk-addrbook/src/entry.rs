use hsk_core::NetAddress;

/// One known peer address (spec §3 "HostEntry"). `used == false` means
/// the entry lives in 1..=8 fresh buckets with `ref_count` tracking how
/// many; `used == true` means it lives in exactly one tried bucket with
/// `ref_count == 0`. [`crate::AddrBook`] enforces this invariant on every
/// mutation.
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub addr: NetAddress,
    pub src: NetAddress,
    pub ref_count: u32,
    pub used: bool,
    pub attempts: u32,
    /// Unix seconds of the last connection attempt, 0 if never attempted.
    pub last_attempt: u64,
    /// Unix seconds of the last successful handshake, 0 if never.
    pub last_success: u64,
}

impl HostEntry {
    pub fn new(addr: NetAddress, src: NetAddress) -> HostEntry {
        HostEntry { addr, src, ref_count: 1, used: false, attempts: 0, last_attempt: 0, last_success: 0 }
    }

    /// The staleness predicate of spec §4.5. Bails out early to `false`
    /// for anything attempted in the last minute, mirroring Bitcoin
    /// Core's `IsTerrible`: a host we are actively retrying can't be
    /// simultaneously considered abandoned.
    pub fn is_stale(&self, now: u64) -> bool {
        if self.last_attempt != 0 && now.saturating_sub(self.last_attempt) < 60 {
            return false;
        }
        if (self.addr.time as u64) > now + 600 {
            return true;
        }
        if self.addr.time == 0 {
            return true;
        }
        if (self.addr.time as u64) < now.saturating_sub(30 * 24 * 3600) {
            return true;
        }
        if self.last_success == 0 && self.attempts >= 3 {
            return true;
        }
        if now.saturating_sub(self.last_success) > 7 * 24 * 3600 && self.attempts >= 10 {
            return true;
        }
        false
    }

    /// The "chance" weight used by `get_host`'s acceptance test (spec
    /// §4.5 "Selection").
    pub fn chance(&self, now: u64) -> f64 {
        let base = 0.66f64.powi(self.attempts.min(8) as i32);
        let recently_attempted = self.last_attempt != 0 && now.saturating_sub(self.last_attempt) < 60;
        base * if recently_attempted { 0.01 } else { 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> NetAddress {
        NetAddress::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 13038)
    }

    #[test]
    fn zero_time_is_stale() {
        let e = HostEntry::new(addr(), addr());
        assert!(e.is_stale(1_000_000));
    }

    #[test]
    fn recent_attempt_overrides_staleness() {
        let mut e = HostEntry::new(addr(), addr());
        e.last_attempt = 999_950;
        assert!(!e.is_stale(1_000_000));
    }

    #[test]
    fn never_succeeded_after_three_attempts_is_stale() {
        let mut e = HostEntry::new(addr(), addr());
        e.addr.time = 1_000_000;
        e.attempts = 3;
        assert!(e.is_stale(1_000_500));
    }
}
