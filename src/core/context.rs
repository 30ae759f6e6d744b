//! Request context threaded through the middleware chain.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Instant;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;

use super::error::{Error, Result};
use super::request::Request;
use super::response::{content_types, header_names, Response, ResponseWriter};
use crate::template::TemplateEngine;

/// Per-request state.
///
/// A context is created by the dispatcher when a request arrives and dropped
/// after the response is flushed. Handlers communicate their result solely by
/// mutating the pending response; nothing reaches the transport until the
/// flush middleware commits it.
///
/// The key/value store is behind a read/write lock even though middleware
/// execution is sequential: the store is public API and must tolerate a
/// handler that hands the context's values to background work.
pub struct Context {
    request: Request,
    writer: Box<dyn ResponseWriter>,
    response: Response,
    params: HashMap<String, String>,
    pattern: Option<String>,
    query_cache: OnceLock<HashMap<String, String>>,
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    template: Option<Arc<dyn TemplateEngine>>,
    started_at: Instant,
    flushed: bool,
}

impl Context {
    /// Create a context for one request.
    pub fn new(request: Request, writer: impl ResponseWriter + 'static) -> Self {
        Self {
            request,
            writer: Box::new(writer),
            response: Response::new(),
            params: HashMap::new(),
            pattern: None,
            query_cache: OnceLock::new(),
            values: RwLock::new(HashMap::new()),
            template: None,
            started_at: Instant::now(),
            flushed: false,
        }
    }

    /// Bind the parameters extracted by the route matcher. Called once.
    pub(crate) fn bind_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Record the registered pattern the request matched.
    pub(crate) fn set_pattern(&mut self, pattern: impl Into<String>) {
        self.pattern = Some(pattern.into());
    }

    /// Attach the template engine configured on the server.
    pub(crate) fn set_template_engine(&mut self, engine: Arc<dyn TemplateEngine>) {
        self.template = Some(engine);
    }

    // Request side

    /// The parsed request.
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Request method.
    #[inline]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Request path.
    #[inline]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// The registered pattern this request matched, e.g. `/user/:id`.
    /// None for unmatched (404) requests.
    #[inline]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Get a bound path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// All bound path parameters.
    #[inline]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Get a query-string parameter by name.
    ///
    /// The query string is parsed once on first access and cached. Keys and
    /// values are percent-decoded, with `+` treated as space.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_cache
            .get_or_init(|| parse_query(self.request.query().unwrap_or("")))
            .get(name)
            .map(|s| s.as_str())
    }

    // Response side

    /// The pending response.
    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable access to the pending response.
    #[inline]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Set the pending status code.
    #[inline]
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    /// Set a pending response header.
    #[inline]
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        self.response.set_header(name, value);
    }

    /// Remove a pending response header.
    #[inline]
    pub fn del_header(&mut self, name: &str) -> bool {
        self.response.remove_header(name)
    }

    /// Set the pending response body.
    #[inline]
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.response.set_body(body);
    }

    /// Respond with plain text: sets status, content type, and body.
    pub fn text(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        self.response.set_status(status);
        self.response.insert_header(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_PLAIN.clone(),
        );
        self.response.set_body(body);
    }

    /// Respond with HTML: sets status, content type, and body.
    pub fn html(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        self.response.set_status(status);
        self.response.insert_header(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_HTML.clone(),
        );
        self.response.set_body(body);
    }

    /// Respond with JSON: serializes `value`, then sets status, content
    /// type, and body atomically.
    ///
    /// Serialization failure leaves the pending response untouched and
    /// propagates as [`Error::Serialization`]; callers that ignore the error
    /// will flush whatever response state was already pending.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        self.response.set_status(status);
        self.response.insert_header(
            header_names::CONTENT_TYPE.clone(),
            content_types::APPLICATION_JSON.clone(),
        );
        self.response.set_body(body);
        Ok(())
    }

    /// Respond with a rendered template via the configured engine.
    ///
    /// Fails with [`Error::Render`] when no engine is configured or the
    /// engine rejects the template.
    pub fn render(
        &mut self,
        status: StatusCode,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<()> {
        let engine = self
            .template
            .clone()
            .ok_or_else(|| Error::Render("no template engine configured".into()))?;
        let body = engine.render(self, template, data)?;
        self.response.set_status(status);
        self.response.insert_header(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_HTML.clone(),
        );
        self.response.set_body(body);
        Ok(())
    }

    // Cross-middleware storage

    /// Store a value for later middleware or handlers.
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), Arc::new(value));
    }

    /// Fetch a stored value, downcast to the requested type.
    ///
    /// Returns None when the key is absent or holds a different type; a type
    /// mismatch is never silently coerced.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = self
            .values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()?;
        value.downcast::<T>().ok()
    }

    /// Remove a stored value. Returns true if the key was present.
    pub fn remove(&self, key: &str) -> bool {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    // Lifecycle

    /// Elapsed time since the context was created.
    #[inline]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Elapsed time in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Whether the pending response has been committed to the transport.
    #[inline]
    pub fn flushed(&self) -> bool {
        self.flushed
    }

    /// Commit the pending response to the transport: headers, then status,
    /// then body.
    ///
    /// This is the only place response bytes leave the system. The first
    /// call wins; later calls are no-ops, so status or body changes made
    /// after a flush never reach the client.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        for (name, value) in self.response.headers().iter() {
            self.writer.insert_header(name.clone(), value.clone());
        }
        self.writer.write_status(self.response.status());
        self.writer.write_body(self.response.body())
    }
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(decode_component(key), decode_component(value));
    }
    map
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_encoding::percent_decode_str(&spaced)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::response::BufferedWriter;
    use bytes::Bytes;
    use http::HeaderMap;

    fn context_for(uri: &str) -> (Context, BufferedWriter) {
        let writer = BufferedWriter::new();
        let request = Request::new(
            Method::GET,
            uri.parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        (Context::new(request, writer.clone()), writer)
    }

    #[test]
    fn test_params_bound_once() {
        let (mut ctx, _) = context_for("/study/python/update");
        let mut params = HashMap::new();
        params.insert("course".to_string(), "python".to_string());
        params.insert("action".to_string(), "update".to_string());
        ctx.bind_params(params);

        assert_eq!(ctx.param("course"), Some("python"));
        assert_eq!(ctx.param("action"), Some("update"));
        assert_eq!(ctx.param("missing"), None);
    }

    #[test]
    fn test_query_parsing_and_cache() {
        let (ctx, _) = context_for("/search?q=hello+world%21&page=2&flag");
        assert_eq!(ctx.query("q"), Some("hello world!"));
        assert_eq!(ctx.query("page"), Some("2"));
        assert_eq!(ctx.query("flag"), Some(""));
        assert_eq!(ctx.query("missing"), None);
    }

    #[test]
    fn test_text_responder() {
        let (mut ctx, _) = context_for("/");
        ctx.text(StatusCode::OK, "hello");

        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(
            ctx.response().header("content-type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(ctx.response().body().as_ref(), b"hello");
    }

    #[test]
    fn test_json_responder() {
        let (mut ctx, _) = context_for("/");
        ctx.json(StatusCode::CREATED, &serde_json::json!({"ok": true}))
            .unwrap();

        assert_eq!(ctx.response().status(), StatusCode::CREATED);
        assert_eq!(
            ctx.response().header("content-type"),
            Some("application/json")
        );
        assert_eq!(ctx.response().body().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_header_set_and_delete() {
        let (mut ctx, _) = context_for("/");
        ctx.set_header("x-version", "1");
        assert_eq!(ctx.response().header("x-version"), Some("1"));
        assert!(ctx.del_header("x-version"));
        assert_eq!(ctx.response().header("x-version"), None);
    }

    #[test]
    fn test_value_store_typed_access() {
        let (ctx, _) = context_for("/");
        ctx.set("count", 7u32);
        ctx.set("who", "tester".to_string());

        assert_eq!(*ctx.get::<u32>("count").unwrap(), 7);
        assert_eq!(*ctx.get::<String>("who").unwrap(), "tester");
        // Wrong type is a miss, not a coercion.
        assert!(ctx.get::<i64>("count").is_none());
        assert!(ctx.get::<u32>("missing").is_none());

        assert!(ctx.remove("count"));
        assert!(ctx.get::<u32>("count").is_none());
    }

    #[test]
    fn test_flush_writes_once() {
        let (mut ctx, writer) = context_for("/");
        ctx.text(StatusCode::OK, "first");
        ctx.flush().unwrap();
        assert!(ctx.flushed());

        // Mutations after the flush never reach the transport.
        ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        ctx.set_body("second");
        ctx.flush().unwrap();

        assert_eq!(writer.status(), StatusCode::OK);
        assert_eq!(writer.body().as_ref(), b"first");
    }

    #[test]
    fn test_render_without_engine_fails() {
        let (mut ctx, _) = context_for("/");
        let err = ctx
            .render(StatusCode::OK, "index.html", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }
}
