//! Peer client error types.

use crate::envelope::ReplyError;

/// Errors from dispatching a call through a [`PeerClient`](super::PeerClient).
///
/// Cloneable so one failure can be reported to every caller waiting on the
/// same worker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeerError {
    /// The connection retry budget ran out before a connection succeeded.
    #[error("retry budget exhausted after {attempts} failed connection attempts")]
    RetriesExhausted {
        /// Number of failed attempts made.
        attempts: u32,
    },

    /// The connection failed mid-call (reply never arrived intact).
    #[error("connection lost: {message}")]
    ConnectionLost {
        /// Description of the transport failure.
        message: String,
    },

    /// The peer client was shut down before the call completed.
    #[error("peer client closed")]
    Closed,

    /// The call envelope could not be encoded.
    #[error("encode error: {message}")]
    Encode {
        /// Description of the codec failure.
        message: String,
    },

    /// The reply payload could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the codec failure.
        message: String,
    },

    /// The peer dispatched the call and reported an error.
    #[error("remote error: {0}")]
    Remote(#[source] ReplyError),
}

impl From<std::io::Error> for PeerError {
    fn from(e: std::io::Error) -> Self {
        PeerError::ConnectionLost {
            message: e.to_string(),
        }
    }
}

/// Result alias for peer operations.
pub type PeerResult<T> = Result<T, PeerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = PeerError::RetriesExhausted { attempts: 3 };
        assert_eq!(
            err.to_string(),
            "retry budget exhausted after 3 failed connection attempts"
        );

        let err = PeerError::Remote(ReplyError::UnknownFunction {
            name: "Add".to_string(),
        });
        assert_eq!(err.to_string(), "remote error: unknown function: Add");
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: PeerError = io.into();
        assert!(matches!(err, PeerError::ConnectionLost { .. }));
    }
}
