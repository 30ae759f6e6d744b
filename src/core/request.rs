//! HTTP request abstraction for handlers and middleware.

use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, Method, Uri};

/// Header name constants for fast lookup.
mod header_names {
    use super::*;

    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
    pub static CONTENT_LENGTH: HeaderName = header::CONTENT_LENGTH;
    pub static COOKIE: HeaderName = header::COOKIE;
    pub static HOST: HeaderName = header::HOST;
    pub static USER_AGENT: HeaderName = header::USER_AGENT;
}

/// HTTP request as seen by the dispatch pipeline.
///
/// The body is fully buffered before dispatch; handlers never see a partial
/// read. Clone is intentionally not derived to prevent expensive copies.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    version: http::Version,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Create a new request.
    #[inline]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            version: http::Version::HTTP_11,
            remote_addr: None,
        }
    }

    /// Get the HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request path.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the raw query string.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Get the full URI.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the request body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the HTTP version.
    #[inline]
    pub fn version(&self) -> http::Version {
        self.version
    }

    /// Get the peer address, when the transport provides one.
    #[inline]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Attach the peer address (set by the server accept loop).
    #[inline]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Get a header value by name (fast path with HeaderName constant).
    #[inline]
    fn header_by_name(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a header value by string name (slower, case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Host header.
    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.header_by_name(&header_names::HOST)
    }

    /// Get Content-Type header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.header_by_name(&header_names::CONTENT_TYPE)
    }

    /// Get Content-Length header.
    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.header_by_name(&header_names::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
    }

    /// Get Cookie header.
    #[inline]
    pub fn cookies(&self) -> Option<&str> {
        self.header_by_name(&header_names::COOKIE)
    }

    /// Get User-Agent header.
    #[inline]
    pub fn user_agent(&self) -> Option<&str> {
        self.header_by_name(&header_names::USER_AGENT)
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<Bytes>,
{
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: body.into(),
            version: parts.version,
            remote_addr: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_http() {
        let http_req = http::Request::builder()
            .method("GET")
            .uri("/test?foo=bar")
            .header("host", "localhost:8080")
            .body(Bytes::new())
            .unwrap();

        let req = Request::from(http_req);

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/test");
        assert_eq!(req.query(), Some("foo=bar"));
        assert_eq!(req.host(), Some("localhost:8080"));
        assert!(req.remote_addr().is_none());
    }

    #[test]
    fn test_request_headers() {
        let http_req = http::Request::builder()
            .method("POST")
            .uri("/api")
            .header("content-type", "application/json")
            .header("content-length", "42")
            .header("user-agent", "test/1.0")
            .header("cookie", "sessid=abc123")
            .body(Bytes::new())
            .unwrap();

        let req = Request::from(http_req);

        assert_eq!(req.content_type(), Some("application/json"));
        assert_eq!(req.content_length(), Some(42));
        assert_eq!(req.user_agent(), Some("test/1.0"));
        assert_eq!(req.cookies(), Some("sessid=abc123"));
    }

    #[test]
    fn test_header_by_string_is_case_insensitive() {
        let http_req = http::Request::builder()
            .method("GET")
            .uri("/")
            .header("x-custom-header", "custom-value")
            .body(Bytes::new())
            .unwrap();

        let req = Request::from(http_req);
        assert_eq!(req.header("x-custom-header"), Some("custom-value"));
        assert_eq!(req.header("X-Custom-Header"), Some("custom-value"));
    }

    #[test]
    fn test_with_remote_addr() {
        let req = Request::new(
            Method::GET,
            "/".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        )
        .with_remote_addr("127.0.0.1:9000".parse().unwrap());

        assert_eq!(req.remote_addr().unwrap().port(), 9000);
    }
}
