//! HTTP server: request dispatcher plus the hyper host loop.
//!
//! The dispatcher walks a fixed lifecycle per request: build the context,
//! match the route, bind parameters, resolve the owning group's middleware,
//! compose the chain with the internal pair outermost, and execute. The
//! flush middleware commits the response; the recovery middleware guarantees
//! a response even when user code panics. Routes and groups are written only
//! during setup; serving takes the server behind `Arc` and reads them
//! concurrently without locks, which is why registration requires `&mut`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::core::{static_bodies, BufferedWriter, Context, Request, ResponseWriter, Result};
use crate::group::{GroupEntry, RouteGroup};
use crate::middleware::{
    build_chain, FlushMiddleware, Handler, Middleware, RecoveryMiddleware,
};
use crate::router::Router;

static BAD_REQUEST_BODY: Bytes = Bytes::from_static(b"Failed to read request body");

/// The web server: route registrar, middleware scopes, and dispatcher.
pub struct Server {
    router: Router,
    groups: Vec<GroupEntry>,
    /// Framework layers wrapped outermost around every chain.
    internal: Vec<Arc<dyn Middleware>>,
    config: ServerConfig,
}

impl Server {
    /// Create a server from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let internal: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RecoveryMiddleware::new(Arc::clone(&config.log_sink))),
            Arc::new(FlushMiddleware),
        ];
        Self {
            router: Router::new(),
            groups: vec![GroupEntry::root()],
            internal,
            config,
        }
    }

    // Registration facade: the server doubles as the root route group.
    // Explicit delegation keeps the group machinery in one place.

    /// Register a handler for an arbitrary method on the root group.
    pub fn handle<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        RouteGroup::new(self, 0).handle(method, pattern, handler)
    }

    /// Register a GET handler.
    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::GET, pattern, handler)
    }

    /// Register a POST handler.
    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::POST, pattern, handler)
    }

    /// Register a PUT handler.
    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::PUT, pattern, handler)
    }

    /// Register a DELETE handler.
    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.handle(Method::DELETE, pattern, handler)
    }

    /// Append middleware to the root group: runs for every request,
    /// including not-found responses.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        RouteGroup::new(self, 0).use_middleware(middleware);
        self
    }

    /// Create a route group under `prefix`, inheriting the middleware
    /// registered on the server so far.
    pub fn group(&mut self, prefix: &str) -> Result<RouteGroup<'_>> {
        let index = crate::group::create_child_group(self, 0, prefix)?;
        Ok(RouteGroup::new(self, index))
    }

    /// The route trie (read-only).
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub(crate) fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub(crate) fn group_entry(&self, index: usize) -> &GroupEntry {
        &self.groups[index]
    }

    pub(crate) fn group_entry_mut(&mut self, index: usize) -> &mut GroupEntry {
        &mut self.groups[index]
    }

    pub(crate) fn push_group(&mut self, entry: GroupEntry) -> usize {
        self.groups.push(entry);
        self.groups.len() - 1
    }

    /// Middleware list for a request path: the most specific matching group
    /// wins (longest prefix, first registered among equals).
    pub(crate) fn middleware_for(&self, path: &str) -> &[Arc<dyn Middleware>] {
        let mut best: Option<&GroupEntry> = None;
        for entry in &self.groups {
            if entry.matches(path) {
                match best {
                    Some(current) if entry.prefix.len() <= current.prefix.len() => {}
                    _ => best = Some(entry),
                }
            }
        }
        best.map(|entry| entry.middleware.as_slice()).unwrap_or(&[])
    }

    /// Dispatch one request through match → chain → flush.
    ///
    /// Every request produces exactly one committed response on `writer`,
    /// panics included. An unmatched route runs a synthetic 404 handler
    /// through the same chain so logging, recovery, and flush apply
    /// uniformly.
    pub fn dispatch(&self, request: Request, writer: impl ResponseWriter + 'static) {
        let method = request.method().clone();
        let path = request.path().to_string();

        let mut ctx = Context::new(request, writer);
        if let Some(engine) = &self.config.template {
            ctx.set_template_engine(Arc::clone(engine));
        }

        let handler: Handler = match self.router.find(&method, &path) {
            Some(matched) => {
                ctx.set_pattern(matched.pattern);
                ctx.bind_params(matched.params);
                Arc::clone(matched.handler)
            }
            None => {
                debug!(method = %method, path = path.as_str(), "no route matched");
                not_found_handler()
            }
        };

        let chain = build_chain(handler, self.middleware_for(&path), &self.internal);
        chain(&mut ctx);
    }

    /// Bind per config and serve until cancelled.
    ///
    /// Spawns one accept loop per worker, each with its own SO_REUSEPORT
    /// listener so the kernel load-balances connections across them.
    pub async fn run(self) -> std::io::Result<()> {
        let num_workers = if self.config.num_workers == 0 {
            num_cpus::get()
        } else {
            self.config.num_workers
        };
        let addr = self.config.addr;

        info!(
            "server listening on http://{} ({} routes, {} workers)",
            addr,
            self.router.route_count(),
            num_workers
        );

        let server = Arc::new(self);
        let mut handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let std_listener = create_reuse_port_listener(addr)?;
            let server = Arc::clone(&server);

            handles.push(tokio::spawn(async move {
                let listener = match TcpListener::from_std(std_listener) {
                    Ok(l) => l,
                    Err(e) => {
                        error!("worker {}: failed to convert listener: {}", worker_id, e);
                        return;
                    }
                };
                debug!("worker {} started", worker_id);
                server.serve_on(listener).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Serve connections from one listener. `run` uses this per worker;
    /// tests use it directly with an ephemeral port.
    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            let server = Arc::clone(&self);
            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle_request(req, remote_addr).await) }
                });

                let io = TokioIo::new(stream);
                if let Err(err) = auto::Builder::new(TokioExecutor::new())
                    .http1()
                    .keep_alive(true)
                    .http2()
                    .max_concurrent_streams(250)
                    .serve_connection(io, service)
                    .await
                {
                    let err_str = format!("{:?}", err);
                    if !is_connection_error(&err_str) {
                        debug!("connection error: {:?}", err);
                    }
                }
            });
        }
    }

    /// hyper adapter: buffer the body, dispatch, convert the committed
    /// response back.
    async fn handle_request(
        self: Arc<Self>,
        req: hyper::Request<IncomingBody>,
        remote_addr: SocketAddr,
    ) -> hyper::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("failed to read request body: {:?}", e);
                return hyper::Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .body(Full::new(BAD_REQUEST_BODY.clone()))
                    .unwrap();
            }
        };

        let request =
            Request::from(http::Request::from_parts(parts, body)).with_remote_addr(remote_addr);

        let writer = BufferedWriter::new();
        self.dispatch(request, writer.clone());

        let (parts, body) = writer.to_http_response().into_parts();
        hyper::Response::from_parts(parts, Full::new(body))
    }
}

/// Synthetic terminal handler for unmatched routes. It still runs through
/// the full middleware chain so recovery and flush apply uniformly.
fn not_found_handler() -> Handler {
    Arc::new(|ctx| {
        ctx.set_status(StatusCode::NOT_FOUND);
        ctx.set_body(static_bodies::NOT_FOUND.clone());
    })
}

/// Creates a socket with SO_REUSEPORT so multiple workers can bind the same
/// port and let the kernel spread connections across them.
fn create_reuse_port_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    use socket2::{Domain, Protocol, Socket, Type};

    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;
    use bytes::Bytes;
    use http::HeaderMap;
    use std::sync::Mutex;

    fn request(method: Method, uri: &str) -> Request {
        Request::new(method, uri.parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    fn dispatch(server: &Server, method: Method, uri: &str) -> BufferedWriter {
        let writer = BufferedWriter::new();
        server.dispatch(request(method, uri), writer.clone());
        writer
    }

    #[test]
    fn test_dispatch_matched_route() {
        let mut server = Server::new(ServerConfig::default());
        server
            .get("/hello", |ctx| ctx.text(StatusCode::OK, "hi"))
            .unwrap();

        let writer = dispatch(&server, Method::GET, "/hello");
        assert_eq!(writer.status(), StatusCode::OK);
        assert_eq!(writer.body().as_ref(), b"hi");
        assert_eq!(
            writer.header("content-type").as_deref(),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_dispatch_binds_params() {
        let mut server = Server::new(ServerConfig::default());
        server
            .get("/user/:id", |ctx| {
                let id = ctx.param("id").unwrap_or("none").to_string();
                ctx.text(StatusCode::OK, id);
            })
            .unwrap();

        let writer = dispatch(&server, Method::GET, "/user/42");
        assert_eq!(writer.body().as_ref(), b"42");
    }

    #[test]
    fn test_dispatch_unmatched_flushes_404() {
        let server = Server::new(ServerConfig::default());
        let writer = dispatch(&server, Method::GET, "/missing");

        // The synthetic handler ran through the chain and was flushed.
        assert!(writer.wrote_status());
        assert_eq!(writer.status(), StatusCode::NOT_FOUND);
        assert_eq!(writer.body().as_ref(), b"404 NOT FOUND");
    }

    #[test]
    fn test_not_found_passes_through_middleware() {
        let mut server = Server::new(ServerConfig::default());
        server.use_middleware(from_fn(|next: Handler| -> Handler {
            Arc::new(move |ctx| {
                next(ctx);
                ctx.set_header("x-seen", "yes");
            })
        }));

        let writer = dispatch(&server, Method::GET, "/missing");
        assert_eq!(writer.status(), StatusCode::NOT_FOUND);
        assert_eq!(writer.header("x-seen").as_deref(), Some("yes"));
    }

    #[test]
    fn test_group_middleware_isolation() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut server = Server::new(ServerConfig::default());
        {
            let order = Arc::clone(&order);
            let mut v1 = server.group("/v1").unwrap();
            v1.use_middleware(from_fn(move |next: Handler| -> Handler {
                let order = Arc::clone(&order);
                Arc::new(move |ctx| {
                    order.lock().unwrap().push("v1-mw");
                    next(ctx);
                })
            }));
            v1.get("/user", |ctx| ctx.text(StatusCode::OK, "v1")).unwrap();
        }
        {
            let mut v2 = server.group("/v2").unwrap();
            v2.get("/user", |ctx| ctx.text(StatusCode::OK, "v2")).unwrap();
        }

        let writer = dispatch(&server, Method::GET, "/v2/user");
        assert_eq!(writer.body().as_ref(), b"v2");
        assert!(order.lock().unwrap().is_empty());

        let writer = dispatch(&server, Method::GET, "/v1/user");
        assert_eq!(writer.body().as_ref(), b"v1");
        assert_eq!(*order.lock().unwrap(), vec!["v1-mw"]);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let marks: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mark = |tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>| {
            let log = Arc::clone(log);
            from_fn(move |next: Handler| -> Handler {
                let log = Arc::clone(&log);
                Arc::new(move |ctx| {
                    log.lock().unwrap().push(tag);
                    next(ctx);
                })
            })
        };

        let mut server = Server::new(ServerConfig::default());
        {
            let mut api = server.group("/api").unwrap();
            api.use_middleware(mark("api", &marks));
            let mut v1 = api.group("/v1").unwrap();
            v1.use_middleware(mark("v1", &marks));
            v1.get("/user", |ctx| ctx.text(StatusCode::OK, "ok")).unwrap();
        }

        dispatch(&server, Method::GET, "/api/v1/user");
        // /api/v1 is the most specific group; its list holds the inherited
        // /api middleware plus its own.
        assert_eq!(*marks.lock().unwrap(), vec!["api", "v1"]);
    }

    #[test]
    fn test_panic_contained_as_500() {
        let mut server = Server::new(ServerConfig::default());
        server
            .get("/explode", |_ctx| panic!("kaboom"))
            .unwrap();

        let writer = dispatch(&server, Method::GET, "/explode");
        assert_eq!(writer.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            writer.body().as_ref(),
            b"Server Internal Error, Please Try Again Later!".as_ref()
        );
    }

    #[test]
    fn test_panic_report_reaches_sink() {
        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_capture = Arc::clone(&captured);

        let config = ServerConfig::default().with_log_sink(Arc::new(move |msg: &str| {
            sink_capture.lock().unwrap().push(msg.to_string());
        }));
        let mut server = Server::new(config);
        server.get("/explode", |_ctx| panic!("kaboom")).unwrap();

        dispatch(&server, Method::GET, "/explode");

        let logs = captured.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("kaboom"));
        assert!(logs[0].contains("GET /explode"));
    }

    #[test]
    fn test_registration_conflict_surfaces() {
        let mut server = Server::new(ServerConfig::default());
        server.get("/dup", |_ctx| {}).unwrap();
        assert!(server.get("/dup", |_ctx| {}).is_err());
        // Different method still registers.
        assert!(server.post("/dup", |_ctx| {}).is_ok());
    }

    #[test]
    fn test_method_mismatch_is_404() {
        let mut server = Server::new(ServerConfig::default());
        server.get("/only-get", |ctx| ctx.text(StatusCode::OK, "ok")).unwrap();

        let writer = dispatch(&server, Method::POST, "/only-get");
        assert_eq!(writer.status(), StatusCode::NOT_FOUND);
    }
}
