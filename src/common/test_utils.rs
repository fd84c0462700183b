use crate::server::{ServerConfig, WsEchoServer};
use crate::Result;
use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// Starts a server on an ephemeral loopback port for integration tests
///
/// The listener is bound before the accept loop is spawned, so the returned
/// address accepts connections immediately. The returned server handle shares
/// state with the running one and can be used to inspect active sessions or
/// send the shutdown signal.
pub async fn spawn_test_server(
    mut config: ServerConfig,
) -> Result<(WsEchoServer, SocketAddr, JoinHandle<Result<()>>)> {
    config.bind_addr = SocketAddr::from(([127, 0, 0, 1], 0));

    let server = WsEchoServer::new(config);
    let listener = server.bind().await?;
    let addr = listener.local_addr()?;

    let running = server.clone();
    let handle = tokio::spawn(async move { running.serve(listener).await });

    Ok((server, addr, handle))
}
