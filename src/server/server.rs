use super::ServerConfig;
use crate::common::EchoServerTrait;
use crate::http::protocol::text_response;
use crate::http::{
    HEALTH_PATH, HttpProtocolError, RequestHead, StaticFiles, health_check, read_request_head,
    write_final_response,
};
use crate::websocket::{HandshakeError, Session, Upgrader};
use crate::{EchoError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::{signal, time::timeout};
use tracing::{Instrument, debug, error, info, warn};

/// WebSocket echo server
///
/// Routes each accepted connection by the path of its first request:
/// the upgrade path enters the echo loop, the health path answers `ok`,
/// and everything else is served from the static directory.
///
/// # Examples
///
/// ```no_run
/// use wsecho::server::{ServerConfig, WsEchoServer};
/// use wsecho::common::EchoServerTrait;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = WsEchoServer::new(ServerConfig::default());
///     let shutdown_signal = server.shutdown_signal();
///
///     let server_handle = tokio::spawn(async move { server.run().await });
///
///     // Stops accepting; sessions already running are left to finish
///     let _ = shutdown_signal.send(());
///     server_handle.await??;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct WsEchoServer {
    config: Arc<ServerConfig>,
    upgrader: Arc<Upgrader>,
    static_files: Arc<StaticFiles>,
    active_sessions: Arc<AtomicUsize>,
    shutdown_signal: Arc<tokio::sync::broadcast::Sender<()>>,
}

impl WsEchoServer {
    /// Creates a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_signal, _) = tokio::sync::broadcast::channel(1);
        Self {
            upgrader: Arc::new(Upgrader::new(config.upgrader.clone())),
            static_files: Arc::new(StaticFiles::new(config.static_dir.clone())),
            config: Arc::new(config),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of WebSocket sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Validates the configuration and binds the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        self.config.validate()?;

        let addr = self.config.bind_addr;
        TcpListener::bind(addr)
            .await
            .map_err(|source| EchoError::Bind { addr, source })
    }

    /// Runs the accept loop on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "WebSocket echo server listening");

        let mut shutdown_rx = self.shutdown_signal.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!(%peer, "Accepted connection");

                            let server = self.clone();
                            let span = tracing::info_span!("connection", %peer);
                            tokio::spawn(async move {
                                let result = server.handle_connection(stream, peer).instrument(span).await;
                                if let Err(e) = result {
                                    error!(%peer, error = %e, "Error handling connection");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!("WebSocket echo server stopped");
        Ok(())
    }

    /// Reads the request head and dispatches on its path
    async fn handle_connection(self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let head = match timeout(
            self.config.head_read_timeout,
            read_request_head(&mut stream, self.config.max_request_head),
        )
        .await
        {
            Ok(Ok(head)) => head,
            Ok(Err(HttpProtocolError::IncompleteRequest)) => {
                debug!(%peer, "Connection closed before a request arrived");
                return Ok(());
            }
            Ok(Err(e)) => {
                if let Some(status) = e.status() {
                    let body = format!(
                        "{} {}\n",
                        status.as_str(),
                        status.canonical_reason().unwrap_or("")
                    );
                    write_final_response(&mut stream, text_response(status, body)).await?;
                }
                return Err(e.into());
            }
            Err(_) => {
                return Err(EchoError::Timeout("waiting for request head".into()));
            }
        };

        let path = head.request.uri().path().to_owned();
        debug!(%peer, method = %head.request.method(), %path, "Request");

        if path == self.upgrader.config().path {
            return self.handle_socket(stream, peer, head).await;
        }

        let response = if path == HEALTH_PATH {
            health_check()
        } else {
            self.static_files.serve(&head.request).await
        };
        write_final_response(&mut stream, response).await?;
        Ok(())
    }

    /// Upgrades the connection and runs its echo loop to completion
    async fn handle_socket(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        head: RequestHead,
    ) -> Result<()> {
        let ws = match self.upgrader.upgrade(stream, head).await {
            Ok(ws) => ws,
            Err(EchoError::Handshake(HandshakeError::NotFound(_))) => return Ok(()),
            Err(e) => {
                warn!(%peer, error = %e, "Upgrade failed");
                return Ok(());
            }
        };

        let session = Session::new(
            ws,
            peer,
            self.config.session.clone(),
            self.active_sessions.clone(),
        );
        session.run().await;
        Ok(())
    }
}

#[async_trait]
impl EchoServerTrait for WsEchoServer {
    /// Binds the configured address and serves until shutdown
    async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Returns a shutdown signal sender that stops the accept loop
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
