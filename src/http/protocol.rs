use bytes::{Bytes, BytesMut};
use http::{HeaderValue, Request, Response, StatusCode, Version, header};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum number of headers accepted in a request head
const MAX_HEADERS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("Incomplete request")]
    IncompleteRequest,
}

impl HttpProtocolError {
    /// Status to answer with, or `None` when the client is already gone
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpProtocolError::HttpParse(_) => Some(StatusCode::BAD_REQUEST),
            HttpProtocolError::HeadTooLarge(_) => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            HttpProtocolError::Io(_) | HttpProtocolError::IncompleteRequest => None,
        }
    }
}

impl From<HttpProtocolError> for crate::EchoError {
    fn from(err: HttpProtocolError) -> Self {
        match err {
            HttpProtocolError::Io(e) => crate::EchoError::Io(e),
            other => crate::EchoError::Http(other.to_string()),
        }
    }
}

/// A parsed request head together with any bytes the client sent after it
///
/// The remainder matters for upgraded connections: a client may pipeline its
/// first WebSocket frame right behind the handshake request.
#[derive(Debug)]
pub struct RequestHead {
    pub request: Request<()>,
    pub remainder: BytesMut,
}

/// Reads from `stream` until a complete HTTP/1.x request head has arrived
///
/// Fails with `HeadTooLarge` once `max_head` bytes are buffered without a
/// complete head, and with `IncompleteRequest` if the peer closes first.
pub async fn read_request_head<S>(
    stream: &mut S,
    max_head: usize,
) -> std::result::Result<RequestHead, HttpProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(1024);

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            return Err(HttpProtocolError::IncompleteRequest);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);

        match parsed.parse(&buffer) {
            Ok(httparse::Status::Complete(head_len)) => {
                let request = build_request(&parsed)?;
                let remainder = buffer.split_off(head_len);
                return Ok(RequestHead { request, remainder });
            }
            Ok(httparse::Status::Partial) => {
                if buffer.len() >= max_head {
                    return Err(HttpProtocolError::HeadTooLarge(max_head));
                }
            }
            Err(e) => {
                return Err(HttpProtocolError::HttpParse(format!(
                    "Failed to parse request head: {e}"
                )));
            }
        }
    }
}

fn build_request(
    parsed: &httparse::Request<'_, '_>,
) -> std::result::Result<Request<()>, HttpProtocolError> {
    let method = parsed
        .method
        .ok_or_else(|| HttpProtocolError::HttpParse("missing method".into()))?;
    let path = parsed
        .path
        .ok_or_else(|| HttpProtocolError::HttpParse("missing path".into()))?;
    let version = match parsed.version {
        Some(1) => Version::HTTP_11,
        _ => Version::HTTP_10,
    };

    let mut builder = Request::builder().method(method).uri(path).version(version);
    for h in parsed.headers.iter() {
        builder = builder.header(h.name, h.value);
    }

    builder
        .body(())
        .map_err(|e| HttpProtocolError::HttpParse(format!("Invalid request head: {e}")))
}

/// Builds a plain-text response with `Content-Length` set
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Bytes> {
    let body = body.into();
    let len = body.len();
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

/// `404 Not Found` with a short plain-text body
pub fn not_found() -> Response<Bytes> {
    text_response(StatusCode::NOT_FOUND, "404 page not found\n")
}

/// Serializes the status line and headers of `response`
pub fn encode_head<T>(response: &Response<T>) -> BytesMut {
    let status = response.status();
    let mut out = BytesMut::with_capacity(256);

    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.as_str().as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(status.canonical_reason().unwrap_or("").as_bytes());
    out.extend_from_slice(b"\r\n");

    for (name, value) in response.headers() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}

/// Writes a complete response and flushes the stream
pub async fn write_response<S>(stream: &mut S, response: &Response<Bytes>) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut out = encode_head(response);
    out.extend_from_slice(response.body());
    stream.write_all(&out).await?;
    stream.flush().await
}

/// Writes a response that ends the connection
///
/// Every non-upgraded request gets exactly one response, so the connection is
/// announced as closing.
pub async fn write_final_response<S>(stream: &mut S, mut response: Response<Bytes>) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    write_response(stream, &response).await?;
    stream.shutdown().await
}
