//! # muster-core
//!
//! Shared abstractions for the muster group-RPC crates:
//!
//! - **Codec**: pluggable message serialization via [`MessageCodec`], with a
//!   default [`JsonCodec`] implementation
//! - **Network provider**: the [`NetworkProvider`] seam that lets the call
//!   machinery run over real TCP ([`TokioNetworkProvider`]) or over mock
//!   connections in tests
//!
//! Peer addresses are plain `"host:port"` strings throughout. They are used
//! both as dial targets and as identity keys (exact string comparison), so
//! this crate deliberately never parses or normalizes them.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod codec;
mod network;

pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use network::{NetworkProvider, TcpListenerTrait, TokioNetworkProvider, TokioTcpListener};
