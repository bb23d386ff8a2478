//! # muster
//!
//! Broadcast named calls over a fixed group of peers.
//!
//! Every process in a group registers plain functions by name in a
//! [`Registry`], serves them over TCP, and can broadcast a call to all
//! members at once, collecting the outputs index-aligned with the member
//! list. Member addresses are plain `"host:port"` strings; a member whose
//! address equals the caller's own serving address is invoked in-process
//! instead of over the network.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use muster::{Group, PeerConfig, Registry, arg};
//! use muster_core::TokioNetworkProvider;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(Registry::new());
//! registry.register("Add", |args| {
//!     let a: i64 = arg(args, 0)?;
//!     let b: i64 = arg(args, 1)?;
//!     Ok(vec![json!(a + b)])
//! })?;
//!
//! let members = vec!["10.0.0.1:7000".to_string(), "10.0.0.2:7000".to_string()];
//! let group = Group::bind(
//!     TokioNetworkProvider::new(),
//!     "10.0.0.1:7000",
//!     members,
//!     registry,
//!     PeerConfig::default(),
//! )
//! .await?;
//!
//! // results[i] holds member i's outputs.
//! let results = group.call("Add", vec![json!(10), json!(21)]).await?;
//! assert_eq!(results[0], vec![json!(31)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! - **Per-peer worker pools**: each member client queues calls on a
//!   bounded channel drained by a fixed pool of workers, each owning one
//!   connection ([`PeerClient`])
//! - **Lazy connections with budgeted retry**: workers connect on first
//!   use and retry refused connections at a fixed interval, so members can
//!   start in any order ([`PeerConfig`])
//! - **Typed errors end to end**: connection exhaustion, remote dispatch
//!   failures, and transport faults all surface as values
//!   ([`PeerError`], [`CallError`])

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod envelope;
pub mod group;
pub mod peer;
pub mod registry;
pub mod server;
pub mod wire;

pub use envelope::{CallEnvelope, CallReply, ReplyError};
pub use group::{CallError, Group, GroupError};
pub use peer::{PeerClient, PeerConfig, PeerError, PeerMetrics, PeerResult};
pub use registry::{HandlerError, Registry, RegistryError, arg};
pub use server::{ServerError, ServerHandle, serve};

pub use muster_core::{
    CodecError, JsonCodec, MessageCodec, NetworkProvider, TcpListenerTrait, TokioNetworkProvider,
};

/// Opaque call argument and output type.
pub use serde_json::Value;
