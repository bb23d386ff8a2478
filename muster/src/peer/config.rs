//! Peer client configuration.

use std::time::Duration;

/// Configuration for a [`PeerClient`](super::PeerClient).
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// How many failed connection attempts to tolerate before a call fails.
    ///
    /// Negative means retry forever. Zero means fail without attempting.
    pub retry_budget: i64,

    /// Fixed delay between connection attempts.
    pub retry_delay: Duration,

    /// Maximum number of calls waiting in the dispatch queue. Callers block
    /// (asynchronously) once the queue is full.
    pub queue_capacity: usize,

    /// Number of worker tasks, each owning one connection to the peer.
    pub workers: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            retry_budget: -1,
            retry_delay: Duration::from_secs(1),
            queue_capacity: 1000,
            workers: 4,
        }
    }
}

impl PeerConfig {
    /// Create configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection retry budget (negative = unlimited).
    pub fn with_retry_budget(mut self, budget: i64) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Set the fixed delay between connection attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the dispatch queue capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (the underlying channel requires a
    /// positive capacity).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        self.queue_capacity = capacity;
        self
    }

    /// Set the worker pool size.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    pub fn with_workers(mut self, workers: usize) -> Self {
        assert!(workers > 0, "worker pool must have at least one worker");
        self.workers = workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PeerConfig::default();
        assert_eq!(config.retry_budget, -1);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn builder_methods() {
        let config = PeerConfig::new()
            .with_retry_budget(3)
            .with_retry_delay(Duration::from_millis(50))
            .with_queue_capacity(10)
            .with_workers(2);

        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(50));
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.workers, 2);
    }

    #[test]
    #[should_panic(expected = "queue capacity")]
    fn zero_capacity_rejected() {
        let _ = PeerConfig::new().with_queue_capacity(0);
    }
}
