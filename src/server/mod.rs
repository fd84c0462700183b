//! Accept loop and request routing

pub mod config;
#[allow(clippy::module_inception)]
pub mod server;


pub use config::ServerConfig;
pub use server::WsEchoServer;
