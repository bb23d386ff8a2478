//! Call envelope and reply types carried in frame payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named call travelling from a caller to a peer.
///
/// The arguments are opaque [`Value`]s; the receiving handler decides how to
/// interpret them. Argument count and meaning are a contract between caller
/// and handler, not something the transport checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Registered function name to dispatch to.
    pub name: String,
    /// Positional call arguments.
    pub args: Vec<Value>,
}

impl CallEnvelope {
    /// Create a new call envelope.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Reply payload: the handler's outputs, or a serializable dispatch error.
pub type CallReply = Result<Vec<Value>, ReplyError>;

/// Errors a peer reports back to the caller inside a reply frame.
///
/// These cross the wire, so they carry plain data rather than source errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ReplyError {
    /// No handler is registered under the requested name.
    #[error("unknown function: {name}")]
    UnknownFunction {
        /// The name the caller asked for.
        name: String,
    },

    /// The handler ran and reported a failure.
    #[error("handler error: {message}")]
    Handler {
        /// Handler-provided failure description.
        message: String,
    },

    /// The peer could not decode the request or encode the reply.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },
}
