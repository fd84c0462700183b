//! HTTP front end
//!
//! Reads a single request head per connection with `httparse`, and provides
//! the plain HTTP responders: static files and the liveness check.

pub mod health;
pub mod protocol;
pub mod static_files;


pub use health::{HEALTH_PATH, health_check};
pub use protocol::{HttpProtocolError, RequestHead, read_request_head, write_final_response};
pub use static_files::StaticFiles;
