use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide network counters, in the shape of the teacher's
/// `ethcore-network::stats::NetworkStats`: plain atomics updated from many
/// sessions concurrently, read occasionally for logging/RPC.
#[derive(Default)]
pub struct NetworkStats {
    pub bytes_sent: AtomicU64,
    pub bytes_recv: AtomicU64,
    pub sessions_opened: AtomicU64,
    pub sessions_closed: AtomicU64,
    pub requests_timed_out: AtomicU64,
    pub ban_events: AtomicU64,
}

impl NetworkStats {
    pub fn new() -> NetworkStats {
        NetworkStats::default()
    }

    pub fn add_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_recv(&self, n: u64) {
        self.bytes_recv.fetch_add(n, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_timed_out(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ban_event(&self) {
        self.ban_events.fetch_add(1, Ordering::Relaxed);
    }
}
