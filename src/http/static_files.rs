use super::protocol::{not_found, text_response};
use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves files from a directory on disk
///
/// Request paths are resolved relative to `root`. Directories are served
/// through their `index.html`. Segments are percent-decoded, and any `..`
/// segment is rejected before the filesystem is touched.
///
/// # Examples
///
/// ```no_run
/// use wsecho::http::StaticFiles;
///
/// # async fn demo() {
/// let files = StaticFiles::new("static");
/// let request = http::Request::get("/index.html").body(()).unwrap();
/// let response = files.serve(&request).await;
/// assert_eq!(response.status(), http::StatusCode::OK);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Answers a `GET` or `HEAD` request from the file tree
    pub async fn serve(&self, request: &Request<()>) -> Response<Bytes> {
        let method = request.method();
        if method != Method::GET && method != Method::HEAD {
            let mut response =
                text_response(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed\n");
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let path = request.uri().path();
        let Some(relative) = resolve(path) else {
            return text_response(StatusCode::BAD_REQUEST, "invalid URL path\n");
        };

        let mut target = self.root.join(relative);
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                if !path.ends_with('/') {
                    return redirect(&format!("{path}/"));
                }
                target.push("index.html");
            }
            Ok(_) => {}
            Err(_) => return not_found(),
        }

        let contents = match tokio::fs::read(&target).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %target.display(), error = %e, "Static file unavailable");
                return not_found();
            }
        };

        debug!(path = %target.display(), size = contents.len(), "Serving static file");

        let len = contents.len();
        let body = if method == Method::HEAD {
            Bytes::new()
        } else {
            Bytes::from(contents)
        };

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type(&target)),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        response
    }
}

/// Maps a URL path onto a relative filesystem path
///
/// Returns `None` on traversal, on a segment that decodes to a separator or
/// NUL, and on percent-escapes that are not valid UTF-8.
fn resolve(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for raw in path.split('/') {
        let segment = percent_decode_str(raw).decode_utf8().ok()?;
        match &*segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['/', '\\', '\0']) => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

fn redirect(location: &str) -> Response<Bytes> {
    match HeaderValue::try_from(location) {
        Ok(value) => {
            let mut response = text_response(StatusCode::MOVED_PERMANENTLY, Bytes::new());
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => text_response(StatusCode::BAD_REQUEST, "invalid URL path\n"),
    }
}

/// Content type for a file, chosen by extension
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
