//! Peer client implementation.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use muster_core::{JsonCodec, MessageCodec, NetworkProvider};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::envelope::{CallEnvelope, CallReply};
use crate::peer::config::PeerConfig;
use crate::peer::error::{PeerError, PeerResult};
use crate::peer::metrics::{Counters, PeerMetrics};
use crate::wire::{encode_frame, read_frame};

/// A call waiting in the dispatch queue.
struct PendingCall {
    envelope: CallEnvelope,
    reply: oneshot::Sender<PeerResult<Vec<Value>>>,
}

/// State shared between the client handle and its workers.
struct PeerShared {
    target: String,
    retry_budget: AtomicI64,
    next_call_id: AtomicU64,
    counters: Counters,
}

/// Client for one remote peer.
///
/// Calls are queued on a bounded channel (callers wait asynchronously when
/// it fills up) and drained by `config.workers` background tasks. Each
/// worker connects lazily on its first call and reconnects on the next call
/// after a transport failure.
///
/// The retry budget is shared across workers and persists across calls:
/// every failed connection attempt consumes one unit until the budget hits
/// zero, after which calls fail with [`PeerError::RetriesExhausted`]. A
/// negative budget retries forever.
///
/// Dropping the client aborts the workers; queued calls resolve to
/// [`PeerError::Closed`].
pub struct PeerClient<N: NetworkProvider, C: MessageCodec = JsonCodec> {
    tx: mpsc::Sender<PendingCall>,
    shared: Arc<PeerShared>,
    workers: Vec<JoinHandle<()>>,
    _marker: std::marker::PhantomData<(N, C)>,
}

impl<N: NetworkProvider> PeerClient<N, JsonCodec> {
    /// Create a peer client for `target` using the default JSON codec.
    pub fn new(provider: N, target: impl Into<String>, config: PeerConfig) -> Self {
        Self::with_codec(provider, target, config, JsonCodec)
    }
}

impl<N: NetworkProvider, C: MessageCodec> PeerClient<N, C> {
    /// Create a peer client for `target` with a custom codec.
    pub fn with_codec(
        provider: N,
        target: impl Into<String>,
        config: PeerConfig,
        codec: C,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let shared = Arc::new(PeerShared {
            target: target.into(),
            retry_budget: AtomicI64::new(config.retry_budget),
            next_call_id: AtomicU64::new(1),
            counters: Counters::default(),
        });

        let workers = (0..config.workers.max(1))
            .map(|_| {
                let provider = provider.clone();
                let codec = codec.clone();
                let shared = Arc::clone(&shared);
                let rx = Arc::clone(&rx);
                let retry_delay = config.retry_delay;
                tokio::spawn(worker_loop(provider, codec, shared, rx, retry_delay))
            })
            .collect();

        Self {
            tx,
            shared,
            workers,
            _marker: std::marker::PhantomData,
        }
    }

    /// Dispatch a call and wait for the peer's outputs.
    ///
    /// Waits for queue space when the dispatch queue is full.
    ///
    /// # Errors
    ///
    /// - `PeerError::RetriesExhausted` if no connection came up in budget
    /// - `PeerError::Remote` if the peer dispatched the call and failed
    /// - `PeerError::ConnectionLost` on transport failure mid-call
    /// - `PeerError::Closed` if the client shut down before the reply
    pub async fn call(&self, name: impl Into<String>, args: Vec<Value>) -> PeerResult<Vec<Value>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = PendingCall {
            envelope: CallEnvelope::new(name, args),
            reply: reply_tx,
        };

        self.tx.send(pending).await.map_err(|_| PeerError::Closed)?;
        reply_rx.await.map_err(|_| PeerError::Closed)?
    }

    /// The `"host:port"` address this client dials.
    pub fn target(&self) -> &str {
        &self.shared.target
    }

    /// Current remaining retry budget (negative = unlimited).
    pub fn retry_budget(&self) -> i64 {
        self.shared.retry_budget.load(Ordering::SeqCst)
    }

    /// Replace the retry budget (negative = unlimited, zero = fail fast).
    pub fn set_retry_budget(&self, budget: i64) {
        self.shared.retry_budget.store(budget, Ordering::SeqCst);
    }

    /// Snapshot of this client's counters.
    pub fn metrics(&self) -> PeerMetrics {
        self.shared.counters.snapshot()
    }
}

impl<N: NetworkProvider, C: MessageCodec> Drop for PeerClient<N, C> {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

impl<N: NetworkProvider, C: MessageCodec> std::fmt::Debug for PeerClient<N, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerClient")
            .field("target", &self.shared.target)
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// Drain the shared queue, issuing one call at a time over this worker's
/// connection.
async fn worker_loop<N: NetworkProvider, C: MessageCodec>(
    provider: N,
    codec: C,
    shared: Arc<PeerShared>,
    rx: Arc<Mutex<mpsc::Receiver<PendingCall>>>,
    retry_delay: Duration,
) {
    let mut conn: Option<(N::TcpStream, Vec<u8>)> = None;

    loop {
        // Holding the receiver lock across recv is the standard shared-MPMC
        // pattern: exactly one idle worker wakes per queued call.
        let pending = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(pending) = pending else {
            break; // client handle dropped
        };

        let request = match codec.encode(&pending.envelope) {
            Ok(payload) => payload,
            Err(e) => {
                Counters::incr(&shared.counters.calls_failed);
                let _ = pending.reply.send(Err(PeerError::Encode {
                    message: e.to_string(),
                }));
                continue;
            }
        };

        if conn.is_none() {
            match connect_with_retry(&provider, &shared, retry_delay).await {
                Ok(stream) => {
                    Counters::incr(&shared.counters.connected_workers);
                    conn = Some((stream, Vec::new()));
                }
                Err(e) => {
                    Counters::incr(&shared.counters.calls_failed);
                    let _ = pending.reply.send(Err(e));
                    continue;
                }
            }
        }
        let Some((stream, readbuf)) = conn.as_mut() else {
            continue;
        };

        let call_id = shared.next_call_id.fetch_add(1, Ordering::Relaxed);
        match issue_call(stream, readbuf, &codec, call_id, &request).await {
            Ok(reply) => {
                Counters::incr(&shared.counters.calls_dispatched);
                let _ = pending
                    .reply
                    .send(reply.map_err(PeerError::Remote));
            }
            Err(e) => {
                // The stream can no longer be trusted to be frame-aligned;
                // drop it and reconnect on the next call.
                debug!(target = %shared.target, error = %e, "dropping connection");
                conn = None;
                Counters::decr(&shared.counters.connected_workers);
                Counters::incr(&shared.counters.calls_failed);
                let _ = pending.reply.send(Err(e));
            }
        }
    }
}

/// Connect to the peer, sleeping `retry_delay` between failed attempts.
///
/// Each failure consumes one unit of the shared budget when it is positive;
/// a negative budget never decrements (retry forever). Returns
/// `RetriesExhausted` once the budget reaches zero, without sleeping after
/// the final attempt.
async fn connect_with_retry<N: NetworkProvider>(
    provider: &N,
    shared: &PeerShared,
    retry_delay: Duration,
) -> PeerResult<N::TcpStream> {
    let mut attempts: u32 = 0;

    loop {
        if shared.retry_budget.load(Ordering::SeqCst) == 0 {
            return Err(PeerError::RetriesExhausted { attempts });
        }

        Counters::incr(&shared.counters.connect_attempts);
        match provider.connect(&shared.target).await {
            Ok(stream) => {
                debug!(target = %shared.target, "connected");
                return Ok(stream);
            }
            Err(e) => {
                attempts += 1;
                Counters::incr(&shared.counters.connect_failures);
                if e.kind() == io::ErrorKind::ConnectionRefused {
                    // The peer is expected to come up eventually; refused
                    // connections are routine during rolling startup.
                    debug!(target = %shared.target, attempt = attempts, "connection refused, retrying");
                } else {
                    warn!(target = %shared.target, attempt = attempts, error = %e, "connection failed, retrying");
                }

                let exhausted = shared
                    .retry_budget
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                        (budget > 0).then(|| budget - 1)
                    })
                    .map(|previous| previous == 1)
                    .unwrap_or(false); // negative budget: unlimited
                if exhausted {
                    return Err(PeerError::RetriesExhausted { attempts });
                }

                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Write one call frame and read the matching reply frame.
async fn issue_call<S, C>(
    stream: &mut S,
    readbuf: &mut Vec<u8>,
    codec: &C,
    call_id: u64,
    request: &[u8],
) -> PeerResult<CallReply>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: MessageCodec,
{
    let frame = encode_frame(call_id, request).map_err(|e| PeerError::Encode {
        message: e.to_string(),
    })?;
    stream.write_all(&frame).await?;

    let Some((reply_id, payload)) = read_frame(stream, readbuf).await? else {
        return Err(PeerError::ConnectionLost {
            message: "connection closed before reply".to_string(),
        });
    };
    if reply_id != call_id {
        return Err(PeerError::ConnectionLost {
            message: format!("reply id {reply_id} does not match call id {call_id}"),
        });
    }

    codec.decode(&payload).map_err(|e| PeerError::Decode {
        message: e.to_string(),
    })
}
