use super::config::SessionConfig;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{error::Elapsed, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Why an echo loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    /// The peer sent a close frame or the stream ended cleanly
    PeerClosed,
    /// Receiving the next message failed
    ReceiveFailed,
    /// Writing the echoed message failed
    SendFailed,
    /// A configured read or write deadline passed
    TimedOut,
}

/// Holds one slot of the active-session count for as long as it lives
///
/// Acquired when a session opens and released when it is dropped, whichever
/// way the session ends.
#[derive(Debug)]
pub struct SessionGuard {
    active: Arc<AtomicUsize>,
    peer: SocketAddr,
    opened_at: Instant,
}

impl SessionGuard {
    pub fn acquire(active: Arc<AtomicUsize>, peer: SocketAddr) -> Self {
        let current = active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%peer, current, "Session opened");
        Self {
            active,
            peer,
            opened_at: Instant::now(),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let current = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        let duration = self.opened_at.elapsed();
        debug!(peer = %self.peer, current, ?duration, "Session released");
    }
}

/// An established WebSocket session, owned by its echo loop
///
/// `run` consumes the session, so nothing can touch it once it has closed.
pub struct Session<S> {
    stream: WebSocketStream<S>,
    peer: SocketAddr,
    config: SessionConfig,
    _guard: SessionGuard,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: WebSocketStream<S>,
        peer: SocketAddr,
        config: SessionConfig,
        active: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            stream,
            peer,
            config,
            _guard: SessionGuard::acquire(active, peer),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Echoes messages until the session ends, then closes it
    pub async fn run(mut self) -> EchoOutcome {
        let (outcome, echoed) = self.echo_loop().await;
        info!(peer = %self.peer, ?outcome, echoed, "Session ended");

        // Flushes a pending close reply, or starts the close handshake
        if let Err(e) = self.stream.close(None).await {
            debug!(peer = %self.peer, error = %e, "Close after session end failed");
        }
        outcome
    }

    async fn echo_loop(&mut self) -> (EchoOutcome, u64) {
        let peer = self.peer;
        let mut echoed = 0u64;

        loop {
            let message = match with_deadline(self.config.read_timeout, self.stream.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    warn!(%peer, error = %e, "Failed to read message");
                    return (EchoOutcome::ReceiveFailed, echoed);
                }
                Ok(None) => {
                    info!(%peer, "Peer closed session");
                    return (EchoOutcome::PeerClosed, echoed);
                }
                Err(_) => {
                    warn!(%peer, "Read timeout");
                    return (EchoOutcome::TimedOut, echoed);
                }
            };

            let kind = match &message {
                Message::Text(_) => "text",
                Message::Binary(_) => "binary",
                Message::Close(frame) => {
                    info!(%peer, ?frame, "Peer sent close frame");
                    return (EchoOutcome::PeerClosed, echoed);
                }
                // pings are answered by the protocol layer
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            let size = message.len();
            debug!(%peer, kind, size, "Received message");

            match with_deadline(self.config.write_timeout, self.stream.send(message)).await {
                Ok(Ok(())) => {
                    echoed += 1;
                    debug!(%peer, kind, size, "Echoed message");
                }
                Ok(Err(e)) => {
                    warn!(%peer, error = %e, "Failed to write message");
                    return (EchoOutcome::SendFailed, echoed);
                }
                Err(_) => {
                    warn!(%peer, "Write timeout");
                    return (EchoOutcome::TimedOut, echoed);
                }
            }
        }
    }
}

async fn with_deadline<F: Future>(
    limit: Option<Duration>,
    fut: F,
) -> std::result::Result<F::Output, Elapsed> {
    match limit {
        Some(limit) => timeout(limit, fut).await,
        None => Ok(fut.await),
    }
}
