use crate::common::EchoClient;
use crate::{EchoError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// How long the client waits for an echoed reply
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket test client for the echo server
///
/// # Examples
///
/// ```no_run
/// use wsecho::websocket::WsEchoClient;
/// use wsecho::common::EchoClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let addr = "127.0.0.1:8080".parse()?;
///     let mut client = WsEchoClient::connect(addr).await?;
///
///     let response = client.echo_string("hello").await?;
///     assert_eq!(response, "hello");
///
///     let data = vec![0x01, 0x02, 0x03, 0xFF];
///     let response = client.echo(&data).await?;
///     assert_eq!(response, data);
///     Ok(())
/// }
/// ```
pub struct WsEchoClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsEchoClient {
    /// Connects to the echo endpoint of a server at `addr`
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_url(&format!("ws://{addr}/ws")).await
    }

    /// Connects to an arbitrary `ws://` URL
    pub async fn connect_url(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self { stream })
    }

    pub async fn send_message(&mut self, message: Message) -> Result<()> {
        self.stream.send(message).await?;
        Ok(())
    }

    /// Waits for the next text or binary message, skipping control frames
    pub async fn next_message(&mut self) -> Result<Message> {
        loop {
            let next = timeout(REPLY_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| EchoError::Timeout("no reply from server".into()))?;

            match next {
                Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => return Ok(message),
                Some(Ok(Message::Close(frame))) => {
                    return Err(EchoError::UnexpectedReply(format!(
                        "server closed the session: {frame:?}"
                    )));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(EchoError::UnexpectedReply(
                        "connection ended without a reply".into(),
                    ));
                }
            }
        }
    }

    /// Sends one message and returns the server's reply
    pub async fn echo_message(&mut self, message: Message) -> Result<Message> {
        self.send_message(message).await?;
        self.next_message().await
    }

    /// Performs the close handshake
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        // Drain until the server's close reply arrives
        while let Some(Ok(_)) = self.stream.next().await {}
        Ok(())
    }
}

#[async_trait]
impl EchoClient for WsEchoClient {
    /// Sends `data` as a binary message
    async fn echo(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        match self.echo_message(Message::binary(data.to_vec())).await? {
            Message::Binary(payload) => Ok(payload.to_vec()),
            other => Err(EchoError::UnexpectedReply(format!(
                "expected a binary reply, got {other:?}"
            ))),
        }
    }

    /// Sends `data` as a text message
    async fn echo_string(&mut self, data: &str) -> Result<String> {
        match self.echo_message(Message::text(data.to_owned())).await? {
            Message::Text(text) => Ok(text.as_str().to_owned()),
            other => Err(EchoError::UnexpectedReply(format!(
                "expected a text reply, got {other:?}"
            ))),
        }
    }
}
