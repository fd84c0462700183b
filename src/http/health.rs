use super::protocol::text_response;
use bytes::Bytes;
use http::{Response, StatusCode};

/// Path polled by the hosting platform to check instance liveness
pub const HEALTH_PATH: &str = "/_ah/health";

/// Liveness response: always `200 OK` with body `ok`
pub fn health_check() -> Response<Bytes> {
    text_response(StatusCode::OK, "ok")
}
