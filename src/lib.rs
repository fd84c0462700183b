use crate::websocket::HandshakeError;
use std::net::SocketAddr;
use thiserror::Error;

/// Error types for the wsecho library
#[derive(Error, Debug)]
pub enum EchoError {
    /// Socket-level errors (accept, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// WebSocket protocol errors after the session is established
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Upgrade negotiation was rejected
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Malformed or oversized HTTP request heads
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The peer answered with something other than the expected echo
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// UTF-8 encoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<::http::Error> for EchoError {
    fn from(err: ::http::Error) -> Self {
        EchoError::Http(err.to_string())
    }
}

/// Result type for the wsecho library
pub type Result<T> = std::result::Result<T, EchoError>;

pub mod common;
pub mod http;
pub mod server;
pub mod websocket;

// Re-export main types for convenience
pub use common::{EchoClient, EchoServerTrait};
pub use server::{ServerConfig, WsEchoServer};
pub use websocket::{
    EchoOutcome, Session, SessionConfig, Upgrader, UpgraderConfig, WsEchoClient,
};
