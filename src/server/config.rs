use crate::http::HEALTH_PATH;
use crate::websocket::{SessionConfig, UpgraderConfig};
use crate::{EchoError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the WebSocket echo server
///
/// # Examples
///
/// ```
/// use wsecho::server::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.bind_addr.port(), 8080);
/// assert_eq!(config.static_dir, std::path::PathBuf::from("static"));
/// assert_eq!(config.upgrader.path, "/ws");
/// ```
///
/// Opting in to session deadlines:
///
/// ```
/// use wsecho::server::ServerConfig;
/// use wsecho::websocket::SessionConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig {
///     session: SessionConfig {
///         read_timeout: Some(Duration::from_secs(60)),
///         write_timeout: Some(Duration::from_secs(10)),
///     },
///     ..ServerConfig::default()
/// };
/// assert!(config.session.read_timeout.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Directory served under `/`
    pub static_dir: PathBuf,
    /// Largest request head accepted before answering 431
    pub max_request_head: usize,
    /// Time allowed for a client to send its request head
    pub head_read_timeout: Duration,
    /// Upgrade negotiation settings
    pub upgrader: UpgraderConfig,
    /// Echo loop settings
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: PathBuf::from("static"),
            max_request_head: 8192,
            head_read_timeout: Duration::from_secs(30),
            upgrader: UpgraderConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Rejects settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        let path = &self.upgrader.path;
        if !path.starts_with('/') {
            return Err(EchoError::Config(format!(
                "upgrade path must start with '/': {path:?}"
            )));
        }
        if path == HEALTH_PATH {
            return Err(EchoError::Config(format!(
                "upgrade path collides with the health check: {path}"
            )));
        }
        if self.upgrader.read_buffer_size == 0 || self.upgrader.write_buffer_size == 0 {
            return Err(EchoError::Config("buffer sizes must be non-zero".into()));
        }
        if self.max_request_head == 0 {
            return Err(EchoError::Config("max_request_head must be non-zero".into()));
        }
        Ok(())
    }
}
