//! Call server: accepts peer connections and dispatches framed calls.
//!
//! Each accepted connection gets its own task that loops reading call
//! frames, dispatching them through the shared [`Registry`], and writing
//! reply frames carrying the same call id. Bad input tears down that one
//! connection; the server itself never stops on a per-connection error.

use std::io;
use std::sync::Arc;

use muster_core::{CodecError, MessageCodec, NetworkProvider, TcpListenerTrait};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::envelope::{CallEnvelope, CallReply, ReplyError};
use crate::registry::Registry;
use crate::wire::{encode_frame, read_frame};

/// Errors from starting the call server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested bind address.
        addr: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Handle to a running call server.
///
/// Dropping the handle aborts the accept loop. Connection tasks already
/// spawned finish on their own when their peers disconnect.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: String,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener actually bound to (useful with port 0).
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// Stop accepting new connections.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Bind a listener on `addr` and serve calls against `registry`.
///
/// Returns once the listener is bound; accepting and dispatching run in
/// background tasks owned by the returned handle.
///
/// # Errors
///
/// Returns `ServerError::Bind` if the listener cannot be bound.
pub async fn serve<N, C>(
    provider: &N,
    addr: &str,
    registry: Arc<Registry>,
    codec: C,
) -> Result<ServerHandle, ServerError>
where
    N: NetworkProvider,
    C: MessageCodec,
{
    let listener = provider.bind(addr).await.map_err(|e| ServerError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    let local_addr = listener.local_addr().unwrap_or_else(|_| addr.to_string());
    debug!(addr = %local_addr, "call server listening");

    let accept_task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    debug!(remote = %remote, "accepted connection");
                    let registry = Arc::clone(&registry);
                    let codec = codec.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, registry, codec).await {
                            debug!(remote = %remote, error = %e, "connection closed");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            }
        }
    });

    Ok(ServerHandle {
        local_addr,
        accept_task,
    })
}

/// Serve one connection until EOF or an unrecoverable stream error.
async fn serve_connection<S, C>(mut stream: S, registry: Arc<Registry>, codec: C) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: MessageCodec,
{
    let mut buf = Vec::new();
    while let Some((call_id, payload)) = read_frame(&mut stream, &mut buf).await? {
        let reply = dispatch(&registry, &codec, &payload);
        let reply_payload = encode_reply(&codec, &reply)?;
        let frame = encode_frame(call_id, &reply_payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        stream.write_all(&frame).await?;
    }
    Ok(())
}

/// Decode an envelope and run it through the registry.
///
/// Decode failures become a `ReplyError::Codec` reply rather than a
/// connection teardown: the frame checksum already verified the bytes
/// arrived intact, so the caller sent something this codec cannot read and
/// deserves to hear about it.
fn dispatch<C: MessageCodec>(registry: &Registry, codec: &C, payload: &[u8]) -> CallReply {
    let envelope: CallEnvelope = match codec.decode(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            return Err(ReplyError::Codec {
                message: e.to_string(),
            });
        }
    };

    debug!(name = %envelope.name, args = envelope.args.len(), "dispatching call");
    registry.call(&envelope.name, &envelope.args)
}

/// Encode a reply, falling back to an encoded error reply when the reply
/// itself will not serialize (e.g. handler output the codec rejects).
fn encode_reply<C: MessageCodec>(codec: &C, reply: &CallReply) -> io::Result<Vec<u8>> {
    match codec.encode(reply) {
        Ok(payload) => Ok(payload),
        Err(e) => {
            warn!(error = %e, "failed to encode reply, sending codec error");
            let fallback: CallReply = Err(ReplyError::Codec {
                message: e.to_string(),
            });
            codec
                .encode(&fallback)
                .map_err(|e: CodecError| io::Error::new(io::ErrorKind::InvalidData, e))
        }
    }
}
