use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Configuration for the connection upgrader
///
/// Built once at startup and shared read-only by every connection.
///
/// # Examples
///
/// ```
/// use wsecho::websocket::UpgraderConfig;
///
/// let config = UpgraderConfig::default();
/// assert_eq!(config.path, "/ws");
/// assert_eq!(config.read_buffer_size, 1024);
/// assert_eq!(config.write_buffer_size, 1024);
/// assert!(config.max_message_size.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct UpgraderConfig {
    /// Path the upgrade is offered on
    pub path: String,
    /// Size of the socket read buffer
    pub read_buffer_size: usize,
    /// Bytes buffered before a write is pushed to the socket
    pub write_buffer_size: usize,
    /// Largest accepted message, `None` for unbounded
    pub max_message_size: Option<usize>,
    /// Reject cross-origin browser requests
    pub check_origin: bool,
}

impl Default for UpgraderConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            // Unbounded, like the reference upgrader; opt in to a limit here
            max_message_size: None,
            check_origin: true,
        }
    }
}

impl UpgraderConfig {
    /// Protocol settings handed to every upgraded session
    pub fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.read_buffer_size = self.read_buffer_size;
        config.write_buffer_size = self.write_buffer_size;
        config.max_message_size = self.max_message_size;
        config.max_frame_size = self.max_message_size;
        config
    }
}

/// Per-session settings for the echo loop
///
/// Both deadlines default to `None`: an idle peer can hold a session open
/// indefinitely unless a limit is configured.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Maximum wait for the next inbound message
    pub read_timeout: Option<Duration>,
    /// Maximum time for an echoed message to be written
    pub write_timeout: Option<Duration>,
}
