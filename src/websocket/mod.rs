//! WebSocket upgrade and echo loop
//!
//! [`Upgrader`] turns an HTTP request on the configured path into a
//! WebSocket stream, and [`Session`] owns that stream for the lifetime of its
//! echo loop: every text or binary message received is sent back unchanged.

pub mod client;
pub mod config;
pub mod session;
pub mod upgrade;

#[cfg(test)]
mod tests;

pub use client::WsEchoClient;
pub use config::{SessionConfig, UpgraderConfig};
pub use session::{EchoOutcome, Session, SessionGuard};
pub use upgrade::{HandshakeError, Upgrader};
