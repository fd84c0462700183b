use super::config::UpgraderConfig;
use crate::http::protocol::{RequestHead, encode_head, not_found, text_response, write_final_response};
use crate::{EchoError, Result};
use bytes::Bytes;
use http::{HeaderValue, Request, Response, StatusCode, Uri, header};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::handshake::server::create_response;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::debug;

/// Reasons an upgrade request is turned away
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("no WebSocket endpoint at {0}")]
    NotFound(String),
    #[error("websocket: the request method is not GET")]
    MethodNotAllowed,
    #[error("websocket: unsupported version: 13 not found in 'Sec-WebSocket-Version' header")]
    UnsupportedVersion,
    #[error("websocket: request origin not allowed")]
    OriginRejected,
    #[error("websocket: the client is not using the websocket protocol: {0}")]
    BadRequest(String),
}

impl HandshakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandshakeError::NotFound(_) => StatusCode::NOT_FOUND,
            HandshakeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HandshakeError::OriginRejected => StatusCode::FORBIDDEN,
            HandshakeError::UnsupportedVersion | HandshakeError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Response sent to the client before the connection is dropped
    ///
    /// The body is the status text; the detailed reason only goes to the log.
    /// Every rejected upgrade advertises the one protocol version we speak.
    pub fn to_response(&self) -> Response<Bytes> {
        if let HandshakeError::NotFound(_) = self {
            return not_found();
        }

        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Bad Request");
        let mut response = text_response(status, format!("{reason}\n"));
        let headers = response.headers_mut();
        headers.insert(
            header::SEC_WEBSOCKET_VERSION,
            HeaderValue::from_static("13"),
        );
        if let HandshakeError::MethodNotAllowed = self {
            headers.insert(header::ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for HandshakeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;

        match err {
            Error::Protocol(ProtocolError::WrongHttpMethod) => HandshakeError::MethodNotAllowed,
            Error::Protocol(ProtocolError::MissingSecWebSocketVersionHeader) => {
                HandshakeError::UnsupportedVersion
            }
            Error::Protocol(other) => HandshakeError::BadRequest(other.to_string()),
            other => HandshakeError::BadRequest(other.to_string()),
        }
    }
}

/// Negotiates the WebSocket upgrade on the configured path
///
/// Holds an immutable [`UpgraderConfig`]; one instance is shared by every
/// connection.
#[derive(Debug, Clone, Default)]
pub struct Upgrader {
    config: UpgraderConfig,
}

impl Upgrader {
    pub fn new(config: UpgraderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UpgraderConfig {
        &self.config
    }

    /// Validates an upgrade request and builds the `101 Switching Protocols`
    /// response for it
    pub fn negotiate(
        &self,
        request: &Request<()>,
    ) -> std::result::Result<Response<()>, HandshakeError> {
        let path = request.uri().path();
        if path != self.config.path {
            return Err(HandshakeError::NotFound(path.to_string()));
        }

        let response = create_response(request)?;

        if self.config.check_origin && !same_origin(request) {
            return Err(HandshakeError::OriginRejected);
        }

        Ok(response)
    }

    /// Completes the handshake on `stream` and returns the open WebSocket
    ///
    /// On rejection the matching error response is written and the
    /// connection shut down before the error is returned.
    pub async fn upgrade<S>(&self, mut stream: S, head: RequestHead) -> Result<WebSocketStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let response = match self.negotiate(&head.request) {
            Ok(response) => response,
            Err(e) => {
                if let Err(write_err) = write_final_response(&mut stream, e.to_response()).await {
                    debug!(error = %write_err, "Failed to write handshake rejection");
                }
                return Err(EchoError::Handshake(e));
            }
        };

        stream.write_all(&encode_head(&response)).await?;
        stream.flush().await?;

        let ws = WebSocketStream::from_partially_read(
            stream,
            head.remainder.to_vec(),
            Role::Server,
            Some(self.config.websocket_config()),
        )
        .await;

        Ok(ws)
    }
}

/// True when the request has no `Origin` header, or its host equals `Host`
fn same_origin(request: &Request<()>) -> bool {
    let Some(origin) = request.headers().get(header::ORIGIN) else {
        return true;
    };

    let Some(origin_host) = origin
        .to_str()
        .ok()
        .and_then(|o| o.parse::<Uri>().ok())
        .and_then(|uri| uri.authority().map(|a| a.as_str().to_owned()))
    else {
        return false;
    };

    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|host| host.eq_ignore_ascii_case(&origin_host))
}
