//! Peer client counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal atomic counters shared between workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) connect_attempts: AtomicU64,
    pub(crate) connect_failures: AtomicU64,
    pub(crate) calls_dispatched: AtomicU64,
    pub(crate) calls_failed: AtomicU64,
    pub(crate) connected_workers: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> PeerMetrics {
        PeerMetrics {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            calls_dispatched: self.calls_dispatched.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            connected_workers: self.connected_workers.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decr(counter: &AtomicU64) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of a peer client's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerMetrics {
    /// Connection attempts made (successful or not).
    pub connect_attempts: u64,
    /// Connection attempts that failed.
    pub connect_failures: u64,
    /// Calls that completed with a reply (success or remote error).
    pub calls_dispatched: u64,
    /// Calls that failed without a reply (transport or retry exhaustion).
    pub calls_failed: u64,
    /// Workers currently holding an established connection.
    pub connected_workers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let counters = Counters::default();
        Counters::incr(&counters.connect_attempts);
        Counters::incr(&counters.connect_attempts);
        Counters::incr(&counters.connect_failures);
        Counters::incr(&counters.calls_dispatched);
        Counters::incr(&counters.connected_workers);
        Counters::incr(&counters.connected_workers);
        Counters::decr(&counters.connected_workers);

        let metrics = counters.snapshot();
        assert_eq!(metrics.connect_attempts, 2);
        assert_eq!(metrics.connect_failures, 1);
        assert_eq!(metrics.calls_dispatched, 1);
        assert_eq!(metrics.calls_failed, 0);
        assert_eq!(metrics.connected_workers, 1);
    }
}
