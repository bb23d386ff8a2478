//! Peer client: queued call dispatch to a single remote peer.
//!
//! A [`PeerClient`] owns a bounded dispatch queue drained by a fixed pool of
//! worker tasks. Each worker holds its own lazily-established connection to
//! the peer and retries failed connection attempts at a fixed interval under
//! a shared budget.

mod config;
mod core;
mod error;
mod metrics;

pub use config::PeerConfig;
pub use core::PeerClient;
pub use error::{PeerError, PeerResult};
pub use metrics::PeerMetrics;
