//! Common traits and helpers used across the wsecho library
//!
//! This module contains the traits that define the interface for echo
//! servers and clients, plus helpers for spinning up servers in tests.

pub mod test_utils;
pub mod traits;

pub use test_utils::spawn_test_server;
pub use traits::{EchoClient, EchoServerTrait};
