//! Pending response state and the transport write seam.
//!
//! Handlers and middleware never touch the wire. They mutate a [`Response`]
//! held by the request context; the flush middleware moves that pending state
//! through a [`ResponseWriter`] exactly once, headers first, then the status
//! line, then the body.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

/// Common header name constants for fast lookup.
pub(crate) mod header_names {
    use super::*;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
}

/// Pre-allocated static header values for common content types.
pub(crate) mod content_types {
    use super::*;
    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
    pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
}

/// Pre-allocated static bodies for framework responses.
pub(crate) mod static_bodies {
    use super::*;
    pub static NOT_FOUND: Bytes = Bytes::from_static(b"404 NOT FOUND");
    pub static INTERNAL_ERROR: Bytes =
        Bytes::from_static(b"Server Internal Error, Please Try Again Later!");
}

/// Pending HTTP response.
///
/// Defaults to 200 with no headers and an empty body. Everything here stays
/// in memory until the flush middleware commits it to the transport.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Create an empty pending response (200, no headers, no body).
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the status code.
    #[inline]
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header by string name and value. Invalid names or values are
    /// silently dropped.
    #[inline]
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
    }

    /// Append a header without replacing existing values (Set-Cookie needs
    /// this).
    #[inline]
    pub fn append_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.append(name, value);
        }
    }

    /// Set a header with typed name and value (zero-alloc for statics).
    #[inline]
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Remove a header by name. Returns true if it was present.
    #[inline]
    pub fn remove_header(&mut self, name: &str) -> bool {
        match HeaderName::try_from(name) {
            Ok(name) => self.headers.remove(name).is_some(),
            Err(_) => false,
        }
    }

    /// Get the pending body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Set the pending body.
    #[inline]
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Get body length in bytes.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport seam for response emission.
///
/// Mirrors the write-once-header constraint of real transports: headers must
/// be staged before the status line is written, and the body comes last.
/// Only the body write can fail; by then the request is unrecoverable, so
/// callers log and move on.
pub trait ResponseWriter: Send {
    /// Stage a response header. Staging the same name twice adds another
    /// value rather than replacing (Set-Cookie relies on this).
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Commit the status line. Headers staged after this point are ignored
    /// by real transports.
    fn write_status(&mut self, status: StatusCode);

    /// Write the response body.
    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Default)]
struct BufferedParts {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Bytes,
}

/// In-memory [`ResponseWriter`] backing the hyper adapter and tests.
///
/// Cloning yields another handle onto the same buffer, so the server can hand
/// one handle to the dispatcher and read the result from the other.
#[derive(Clone, Debug, Default)]
pub struct BufferedWriter {
    inner: Arc<Mutex<BufferedParts>>,
}

impl BufferedWriter {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferedParts> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Status committed by the flush, or 200 if nothing was written.
    pub fn status(&self) -> StatusCode {
        self.lock().status.unwrap_or(StatusCode::OK)
    }

    /// Whether a status line was committed at all.
    pub fn wrote_status(&self) -> bool {
        self.lock().status.is_some()
    }

    /// Snapshot of the staged headers.
    pub fn headers(&self) -> HeaderMap {
        self.lock().headers.clone()
    }

    /// Get a staged header value by name.
    pub fn header(&self, name: &str) -> Option<String> {
        self.lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// The written body (cheap clone).
    pub fn body(&self) -> Bytes {
        self.lock().body.clone()
    }

    /// Convert the buffered state into an `http` response.
    pub fn to_http_response(&self) -> http::Response<Bytes> {
        let parts = self.lock();
        let mut builder = http::Response::builder().status(parts.status.unwrap_or(StatusCode::OK));
        if let Some(headers) = builder.headers_mut() {
            *headers = parts.headers.clone();
        }
        builder
            .body(parts.body.clone())
            .unwrap_or_else(|_| http::Response::new(Bytes::new()))
    }
}

impl ResponseWriter for BufferedWriter {
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.append(name, value);
    }

    fn write_status(&mut self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.lock().body = Bytes::copy_from_slice(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_response_defaults() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
        assert_eq!(res.body_len(), 0);
    }

    #[test]
    fn test_set_and_remove_header() {
        let mut res = Response::new();
        res.set_header("x-custom", "value");
        assert_eq!(res.header("x-custom"), Some("value"));
        assert_eq!(res.header("X-Custom"), Some("value"));

        assert!(res.remove_header("x-custom"));
        assert!(!res.remove_header("x-custom"));
        assert_eq!(res.header("x-custom"), None);
    }

    #[test]
    fn test_invalid_header_is_dropped() {
        let mut res = Response::new();
        res.set_header("bad header name", "value");
        assert!(res.headers().is_empty());
    }

    #[test]
    fn test_append_header_keeps_existing() {
        let mut res = Response::new();
        res.append_header("set-cookie", "a=1");
        res.append_header("set-cookie", "b=2");
        assert_eq!(res.headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_body_roundtrip() {
        let mut res = Response::new();
        res.set_body("hello");
        assert_eq!(res.body().as_ref(), b"hello");
        assert_eq!(res.body_len(), 5);
    }

    #[test]
    fn test_buffered_writer_commit_order() {
        let mut w = BufferedWriter::new();
        assert!(!w.wrote_status());

        w.insert_header(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_PLAIN.clone(),
        );
        w.write_status(StatusCode::CREATED);
        w.write_body(b"made").unwrap();

        assert!(w.wrote_status());
        assert_eq!(w.status(), StatusCode::CREATED);
        assert_eq!(
            w.header("content-type").as_deref(),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(w.body().as_ref(), b"made");
    }

    #[test]
    fn test_buffered_writer_clone_shares_state() {
        let mut w = BufferedWriter::new();
        let reader = w.clone();

        w.write_status(StatusCode::NOT_FOUND);
        w.write_body(b"gone").unwrap();

        assert_eq!(reader.status(), StatusCode::NOT_FOUND);
        assert_eq!(reader.body().as_ref(), b"gone");
    }

    #[test]
    fn test_to_http_response() {
        let mut w = BufferedWriter::new();
        w.insert_header(
            header_names::CONTENT_TYPE.clone(),
            content_types::APPLICATION_JSON.clone(),
        );
        w.write_status(StatusCode::OK);
        w.write_body(b"{}").unwrap();

        let res = w.to_http_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("content-type").unwrap(), "application/json");
        assert_eq!(res.body().as_ref(), b"{}");
    }
}
